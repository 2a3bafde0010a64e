use crate::config::{AppConfig, UploadBackend};
use crate::error::AppError;
use std::fs;
use std::path::Path;

/// 执行启动检查
///
/// 1. 检查并创建本地临时目录
/// 2. local 上传后端：检查并创建存储根目录
/// 3. 检查 SQLite 文件所在目录
/// 4. http 上传后端：检查 endpoint 是否配置
pub async fn run_startup_checks(config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("🔍 开始执行启动检查...");

    ensure_folder("临时", &config.temp_folder())?;

    match config.upload.backend {
        UploadBackend::Local => ensure_folder("上传", &config.upload_local_dir())?,
        UploadBackend::Http => {
            if config.upload.http_endpoint.trim().is_empty() {
                return Err(AppError::Internal(
                    "upload.backend = http 时必须配置 upload.http_endpoint".into(),
                ));
            }
            tracing::info!("✅ 上传网关: {}", config.upload.http_endpoint);
        }
    }

    if let Some(parent) = Path::new(&config.storage.sqlite_path).parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_folder("数据库", parent)?;
    }

    tracing::info!("✅ 启动检查完成");
    Ok(())
}

/// 确保目录存在，创建失败视为启动失败
fn ensure_folder(label: &str, path: &Path) -> Result<(), AppError> {
    if path.exists() {
        tracing::info!("✅ {}目录已存在: {:?}", label, path);
        return Ok(());
    }
    tracing::warn!("📁 未找到{}目录，正在创建: {:?}", label, path);
    fs::create_dir_all(path)
        .map_err(|e| AppError::Internal(format!("创建{label}目录 {} 失败: {e}", path.display())))?;
    tracing::info!("✅ {}目录创建成功", label);
    Ok(())
}
