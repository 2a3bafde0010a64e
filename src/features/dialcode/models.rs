use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::image_config::CanonicalConfig;

/// 记录归属范围：(channel, publisher)，不同租户的图片互不可见。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// 命名空间（channel）
    pub namespace: String,
    /// 所有者（publisher）
    pub owner: String,
}

impl Scope {
    pub fn new(namespace: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            owner: owner.into(),
        }
    }
}

/// 图片记录生命周期状态。只允许 `Pending -> Ready` 单向迁移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    /// 已预留文件名，尚未生成完成
    Pending,
    /// 已上传，`url` 可用
    Ready,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Ready => "ready",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(ImageStatus::Pending),
            "ready" => Some(ImageStatus::Ready),
            _ => None,
        }
    }
}

/// 持久化的图片记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub dialcode: String,
    pub scope: Scope,
    pub config: CanonicalConfig,
    pub status: ImageStatus,
    pub filename: String,
    pub url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// 预留阶段写入的新记录（状态固定为 Pending）
#[derive(Debug, Clone)]
pub struct NewImageRecord {
    pub dialcode: String,
    pub scope: Scope,
    pub config: CanonicalConfig,
    pub filename: String,
}

/// 状态更新参数
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: ImageStatus,
    pub url: Option<String>,
}

impl StatusUpdate {
    pub fn ready(url: impl Into<String>) -> Self {
        Self {
            status: ImageStatus::Ready,
            url: Some(url.into()),
        }
    }
}

/// get_image 的可选参数
#[derive(Debug, Clone)]
pub struct GetImageOptions {
    /// 覆盖本地临时目录（默认 `<temp_folder>/<channel>/<publisher>`）
    pub local_path: Option<PathBuf>,
    /// 覆盖上传目录（默认 `<channel>/<publisher>`）
    pub upload_path: Option<String>,
    /// 上传成功后是否删除本地文件
    pub delete_local_file: bool,
}

impl Default for GetImageOptions {
    fn default() -> Self {
        Self {
            local_path: None,
            upload_path: None,
            delete_local_file: true,
        }
    }
}

/// get_image 的统一返回值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetImageOutcome {
    pub url: String,
    /// true 表示本次请求新生成了图片；false 表示命中缓存
    pub created: bool,
}

/// 生成流水线的各个阶段（按执行顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reserve,
    Render,
    Finish,
    Resize,
    Upload,
    Commit,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Reserve => "reserve",
            Stage::Render => "render",
            Stage::Finish => "finish",
            Stage::Resize => "resize",
            Stage::Upload => "upload",
            Stage::Commit => "commit",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
