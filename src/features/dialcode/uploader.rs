use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};

use crate::error::ImageError;

/// 把本地文件发布到持久存储，返回公开访问地址
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, destination_key: &str, local_path: &Path) -> Result<String, ImageError>;
}

/// 公开地址 = 基地址 + "/" + 目标键
pub fn public_url(base_url: &str, destination_key: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        destination_key.trim_start_matches('/')
    )
}

/// 目标键只允许相对路径片段，防止写出存储根目录
fn validate_key(destination_key: &str) -> Result<(), ImageError> {
    let invalid = destination_key.is_empty()
        || destination_key.starts_with('/')
        || destination_key.contains('\\')
        || destination_key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(ImageError::Upload(format!("非法的目标路径: {destination_key}")));
    }
    Ok(())
}

/// 上传到本地目录（由 HTTP 服务以静态文件方式对外提供）
#[derive(Debug, Clone)]
pub struct LocalUploader {
    root: PathBuf,
    public_base_url: String,
}

impl LocalUploader {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl ImageUploader for LocalUploader {
    async fn upload(&self, destination_key: &str, local_path: &Path) -> Result<String, ImageError> {
        validate_key(destination_key)?;
        let dest = self.root.join(destination_key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ImageError::Upload(format!("创建目录 {} 失败: {e}", parent.display())))?;
        }
        tokio::fs::copy(local_path, &dest).await.map_err(|e| {
            ImageError::Upload(format!(
                "复制 {} -> {} 失败: {e}",
                local_path.display(),
                dest.display()
            ))
        })?;
        Ok(public_url(&self.public_base_url, destination_key))
    }
}

/// 通过 HTTP PUT 上传到对象存储网关
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
    public_base_url: String,
    bearer_token: Option<String>,
}

impl HttpUploader {
    pub fn new(
        endpoint: impl Into<String>,
        public_base_url: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ImageError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImageError::Upload(format!("构建 HTTP Client 失败: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            public_base_url: public_base_url.into(),
            bearer_token: bearer_token.filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl ImageUploader for HttpUploader {
    async fn upload(&self, destination_key: &str, local_path: &Path) -> Result<String, ImageError> {
        validate_key(destination_key)?;
        let body = tokio::fs::read(local_path).await.map_err(|e| {
            ImageError::Upload(format!("读取 {} 失败: {e}", local_path.display()))
        })?;

        let target = public_url(&self.endpoint, destination_key);
        let mut req = self
            .client
            .put(&target)
            .header(header::CONTENT_TYPE, "image/png")
            .body(body);
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ImageError::Upload(format!(
                "PUT {target} 返回 {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }
        Ok(public_url(&self.public_base_url, destination_key))
    }
}
