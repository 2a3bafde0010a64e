use std::sync::Arc;

use crate::config::{AppConfig, UploadBackend};
use crate::error::AppError;
use crate::features::dialcode::finisher::SvgFinisher;
use crate::features::dialcode::renderer::QrPngRenderer;
use crate::features::dialcode::store::SqliteImageStore;
use crate::features::dialcode::uploader::{HttpUploader, ImageUploader, LocalUploader};
use crate::features::dialcode::{ImageCollaborators, ImageService, ImageServiceSettings};
use crate::shutdown::ShutdownManager;

/// 按配置装配具体协作方，得到可直接挂到路由上的图片服务
pub async fn build_image_service(
    config: &AppConfig,
    shutdown: &ShutdownManager,
) -> Result<ImageService, AppError> {
    let store =
        SqliteImageStore::connect_sqlite(&config.storage.sqlite_path, config.storage.sqlite_wal)
            .await?;
    store.init_schema().await?;
    tracing::info!("图片记录库已就绪: {}", config.storage.sqlite_path);

    let uploader: Arc<dyn ImageUploader> = match config.upload.backend {
        UploadBackend::Local => Arc::new(LocalUploader::new(
            config.upload_local_dir(),
            config.upload.public_base_url.clone(),
        )),
        UploadBackend::Http => Arc::new(HttpUploader::new(
            config.upload.http_endpoint.clone(),
            config.upload.public_base_url.clone(),
            config.upload.http_token.clone(),
            config.upload.timeout_duration(),
        )?),
    };
    tracing::info!(
        "上传后端: {:?}，公开地址: {}",
        config.upload.backend,
        config.upload.public_base_url
    );

    let deps = ImageCollaborators {
        store: Arc::new(store),
        renderer: Arc::new(QrPngRenderer::new(config.image.module_size_px)),
        finisher: Arc::new(SvgFinisher::new()),
        uploader,
    };
    let settings = ImageServiceSettings {
        temp_folder: config.temp_folder(),
        registry_url: config.dialcode.registry_url.clone(),
    };

    Ok(ImageService::new(deps, settings)
        .with_render_permits(config.image.effective_parallel())
        .with_shutdown(shutdown.clone()))
}
