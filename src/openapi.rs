use utoipa::OpenApi;
use utoipa::openapi::server::{ServerBuilder, ServerVariableBuilder};
use utoipa::Modify;

/// 为 Swagger UI 提供正确的“业务接口前缀”Servers 配置。
///
/// - 业务接口默认前缀为 `/api/v1`（对应 `config.api.prefix` / `APP_API__PREFIX`）。
/// - `/health` 不带前缀，因此额外提供 `/` 作为备用 server。
struct ApiServers;

impl Modify for ApiServers {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let api = ServerBuilder::new()
            .url("{api_prefix}")
            .description(Some("业务接口（默认 /api/v1）"))
            .parameter(
                "api_prefix",
                ServerVariableBuilder::new()
                    .default_value("/api/v1")
                    .description(Some(
                        "业务接口前缀：对应 config.api.prefix（可通过 APP_API__PREFIX 覆盖）",
                    )),
            )
            .build();

        let root = ServerBuilder::new()
            .url("/")
            .description(Some("根路径（用于 /health）"))
            .build();

        openapi.servers = Some(vec![api, root]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::dialcode::handler::get_dialcode_image,
    ),
    components(schemas(
        crate::error::ProblemDetails,
        crate::features::health::HealthResponse,
        crate::features::dialcode::GetImageRequest,
        crate::features::dialcode::GetImageResponse,
        crate::features::dialcode::ImageConfigInput,
    )),
    modifiers(&ApiServers),
    tags(
        (
            name = "Dialcode",
            description = "拨号码二维码图片：按规范化配置去重，未命中时生成并上传。"
        ),
        (name = "Health", description = "健康检查：服务探活。"),
    ),
    info(
        title = "Dialcode Image API",
        version = env!("CARGO_PKG_VERSION"),
        description = "拨号码二维码图片服务（Axum + utoipa）。除 /health 外，业务接口挂载在 `config.api.prefix`（默认 /api/v1）下，OpenAPI 的 paths 不包含该前缀。"
    )
)]
pub struct ApiDoc;
