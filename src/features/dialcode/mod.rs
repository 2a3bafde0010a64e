//! 拨号码二维码图片：规范化配置、缓存查找、生成流水线与 HTTP 入口。

pub mod color;
pub mod finisher;
pub mod handler;
pub mod image_config;
pub mod lookup;
pub mod models;
mod pipeline;
mod raster;
pub mod renderer;
pub mod service;
pub mod store;
pub mod types;
pub mod uploader;

pub use handler::create_dialcode_router;
pub use image_config::{CanonicalConfig, ImageConfig, ImageConfigInput};
pub use models::{GetImageOptions, GetImageOutcome, ImageRecord, ImageStatus, Scope, Stage};
pub use service::{ImageCollaborators, ImageService, ImageServiceSettings};
pub use types::{GetImageRequest, GetImageResponse};
