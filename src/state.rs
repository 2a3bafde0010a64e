use std::sync::Arc;

use crate::features::dialcode::ImageService;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 拨号码图片服务（内部持有存储、渲染、后处理、上传协作方）
    pub image_service: Arc<ImageService>,
}
