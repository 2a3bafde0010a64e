use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::features::dialcode::models::Stage;

/// 应用统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 参数校验错误
    #[error("参数校验错误: {0}")]
    Validation(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 请求体 JSON 无法解析或字段冲突
    #[error("JSON 解析错误: {0}")]
    Json(String),

    /// 图片生成流水线错误
    #[error("{0}")]
    Image(#[from] ImageError),
}

/// 图片生成流水线错误类型
///
/// `Directory` 与 `LocalCleanup` 只用于日志记录，不会返回给调用方。
#[derive(Error, Debug)]
pub enum ImageError {
    /// 记录预留/查询/更新失败
    #[error("存储错误: {0}")]
    Store(String),

    /// 本地临时目录创建失败
    #[error("目录创建失败: {0}")]
    Directory(String),

    /// 二维码渲染失败
    #[error("二维码渲染失败: {0}")]
    Render(String),

    /// 文字/边框叠加或缩放失败
    #[error("图片后处理失败: {0}")]
    Finish(String),

    /// 上传到持久存储失败
    #[error("上传失败: {0}")]
    Upload(String),

    /// 本地临时文件删除失败
    #[error("本地文件清理失败: {0}")]
    LocalCleanup(String),

    /// 服务正在退出，流水线在该阶段被中止
    #[error("生成已取消（阶段: {0}）")]
    Cancelled(Stage),
}

/// RFC7807 风格的错误响应（Problem Details）。
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Validation Failed")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 422)]
    pub status: u16,

    /// 人类可读的详细信息（尽量稳定，不建议依赖解析）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "VALIDATION_FAILED")]
    pub code: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Image(e) => match e {
                ImageError::Render(_) | ImageError::Finish(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ImageError::Upload(_) => StatusCode::BAD_GATEWAY,
                ImageError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
                ImageError::Store(_) | ImageError::Directory(_) | ImageError::LocalCleanup(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Json(_) => "BAD_REQUEST",
            AppError::Image(e) => match e {
                ImageError::Store(_) => "IMAGE_STORE_FAILED",
                ImageError::Render(_) | ImageError::Finish(_) => "IMAGE_RENDER_FAILED",
                ImageError::Upload(_) => "IMAGE_UPLOAD_FAILED",
                ImageError::Cancelled(_) => "IMAGE_CANCELLED",
                ImageError::Directory(_) | ImageError::LocalCleanup(_) => "INTERNAL_ERROR",
            },
        }
    }

    fn title(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Validation Failed",
            AppError::Json(_) => "Bad Request",
            AppError::Internal(_) => "Internal Server Error",
            AppError::Image(e) => match e {
                ImageError::Render(_) | ImageError::Finish(_) => "Unprocessable Image",
                ImageError::Upload(_) => "Bad Gateway",
                ImageError::Cancelled(_) => "Service Unavailable",
                ImageError::Store(_) | ImageError::Directory(_) | ImageError::LocalCleanup(_) => {
                    "Internal Server Error"
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.to_string()),
            code: self.stable_code().to_string(),
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}

// =============== Error conversions for common external errors ===============

impl From<reqwest::Error> for ImageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ImageError::Upload(format!("请求超时: {err}"))
        } else {
            ImageError::Upload(err.to_string())
        }
    }
}
