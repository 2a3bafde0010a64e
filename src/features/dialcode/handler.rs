use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};

use crate::error::AppError;
use crate::state::AppState;

use super::image_config::ImageConfig;
use super::models::{GetImageOptions, Scope};
use super::types::{GetImageRequest, GetImageResponse};

const MAX_FIELD_CHARS: usize = 128;

/// 拨号码/渠道/发布方会参与本地路径与上传路径拼接，只允许单个路径片段
fn validate_segment(name: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} 不能为空")));
    }
    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(AppError::Validation(format!(
            "{name} 过长（最大 {MAX_FIELD_CHARS} 字符）"
        )));
    }
    if value.contains('/') || value.contains('\\') || value.contains("..") {
        return Err(AppError::Validation(format!("{name} 不能包含路径分隔符或 ..")));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/dialcode/image",
    summary = "获取拨号码二维码图片",
    description = "按 (dialcode, channel, publisher, 规范化配置) 查找已生成的图片；未命中时渲染二维码、叠加文字与边框、缩放、上传后返回公开地址。",
    request_body = GetImageRequest,
    responses(
        (status = 200, description = "成功（created=false 表示命中已有图片）", body = GetImageResponse),
        (
            status = 400,
            description = "请求体不是合法 JSON，或纠错级别的多个别名字段同时出现",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 422,
            description = "参数校验失败或图片渲染失败",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 502,
            description = "上传到持久存储失败",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 503,
            description = "服务退出中，生成被中止",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 500,
            description = "记录存储失败或服务器内部错误",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        )
    ),
    tag = "Dialcode"
)]
pub async fn get_dialcode_image(
    State(state): State<AppState>,
    payload: Result<Json<GetImageRequest>, JsonRejection>,
) -> Result<Json<GetImageResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::Json(e.body_text()))?;
    validate_segment("dialcode", &req.dialcode)?;
    validate_segment("channel", &req.channel)?;
    validate_segment("publisher", &req.publisher)?;

    let config = req
        .config
        .as_ref()
        .map(ImageConfig::from_input)
        .unwrap_or_default();
    let scope = Scope::new(req.channel.trim(), req.publisher.trim());
    let options = GetImageOptions {
        delete_local_file: req.delete_local_file.unwrap_or(true),
        ..GetImageOptions::default()
    };

    let outcome = state
        .image_service
        .get_image(req.dialcode.trim(), &scope, &config, options)
        .await?;

    Ok(Json(GetImageResponse {
        url: outcome.url,
        created: outcome.created,
    }))
}

pub fn create_dialcode_router() -> Router<AppState> {
    Router::new().route("/dialcode/image", post(get_dialcode_image))
}
