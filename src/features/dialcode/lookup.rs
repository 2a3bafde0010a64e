use super::image_config::CanonicalConfig;
use super::models::{ImageRecord, ImageStatus, Scope};
use super::store::ImageRecordStore;

/// 查找已生成且配置完全一致的图片记录。
///
/// 查询失败按未命中处理（fail-open）：读失败不阻塞生成，代价是可能产生重复图片。
pub async fn find_cached(
    store: &dyn ImageRecordStore,
    dialcode: &str,
    scope: &Scope,
    config: &CanonicalConfig,
) -> Option<ImageRecord> {
    let records = match store.find_ready(dialcode, scope).await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(
                dialcode,
                channel = %scope.namespace,
                publisher = %scope.owner,
                "查询已生成图片失败，按未命中处理: {}",
                e
            );
            return None;
        }
    };
    tracing::debug!(dialcode, candidates = records.len(), "查询已生成图片完成");

    records.into_iter().find(|r| {
        r.status == ImageStatus::Ready
            && r.url.as_deref().is_some_and(|u| !u.is_empty())
            && &r.config == config
    })
}
