//! 缓存未命中时的生成流水线：
//! 预留记录 → 渲染 → 叠加文字/边框 → 缩放 → 上传 → 提交 → 清理本地文件。
//!
//! 各阶段严格串行，任一阶段（清理除外）失败即中止，不做重试与回滚；
//! 预留之后的失败会留下永久 Pending 的记录。

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::Semaphore;

use crate::error::ImageError;
use crate::shutdown::ShutdownManager;

use super::finisher::ImageFinisher;
use super::image_config::{CanonicalConfig, ImageConfig};
use super::models::{GetImageOutcome, NewImageRecord, Scope, Stage, StatusUpdate};
use super::renderer::{QrRenderer, RenderSpec};
use super::store::ImageRecordStore;
use super::uploader::ImageUploader;

static LAST_SUFFIX_MS: AtomicI64 = AtomicI64::new(0);

/// 生成 `<dialcode>_<毫秒时间戳>` 形式的文件名；进程内后缀严格递增。
pub fn next_filename(dialcode: &str) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let prev = LAST_SUFFIX_MS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    format!("{}_{}", dialcode.trim(), now.max(prev + 1))
}

/// 单次生成任务的输入
pub(crate) struct PipelineJob<'a> {
    pub dialcode: &'a str,
    pub scope: &'a Scope,
    pub config: &'a ImageConfig,
    pub canonical: CanonicalConfig,
    pub local_dir: PathBuf,
    pub upload_dir: String,
    pub delete_local_file: bool,
}

pub(crate) struct GenerationPipeline<'a> {
    pub store: &'a dyn ImageRecordStore,
    pub renderer: &'a dyn QrRenderer,
    pub finisher: &'a dyn ImageFinisher,
    pub uploader: &'a dyn ImageUploader,
    pub render_permits: &'a Semaphore,
    pub shutdown: Option<&'a ShutdownManager>,
    pub registry_url: &'a str,
}

impl GenerationPipeline<'_> {
    pub async fn run(&self, job: PipelineJob<'_>) -> Result<GetImageOutcome, ImageError> {
        // 1. 预留
        let record = NewImageRecord {
            dialcode: job.dialcode.to_string(),
            scope: job.scope.clone(),
            config: job.canonical.clone(),
            filename: next_filename(job.dialcode),
        };
        let filename = self
            .stage(Stage::Reserve, job.dialcode, self.store.insert(&record))
            .await?;
        tracing::info!(
            dialcode = job.dialcode,
            channel = %job.scope.namespace,
            publisher = %job.scope.owner,
            filename = %filename,
            "图片记录已预留"
        );

        // 2~4. 渲染与后处理，受并发渲染许可限制
        let local_file = {
            let _permit = self
                .stage(Stage::Render, &filename, async {
                    self.render_permits
                        .acquire()
                        .await
                        .map_err(|e| ImageError::Render(format!("获取渲染信号量失败: {e}")))
                })
                .await?;

            ensure_dir(&job.local_dir).await;
            let output = job.local_dir.join(format!("{filename}.png"));
            let text = format!("{}{}", self.registry_url, job.dialcode);
            let cfg = job.config;
            let spec = RenderSpec {
                output: &output,
                text: &text,
                color: &cfg.color,
                background_color: &cfg.background_color,
                error_correction_level: cfg.error_correction_level,
                margin: cfg.margin,
            };
            let rendered = self
                .stage(Stage::Render, &filename, self.renderer.render(&spec))
                .await?;

            let caption = if cfg.show_text { job.dialcode.trim() } else { "" };
            let stamped = self
                .stage(
                    Stage::Finish,
                    &filename,
                    self.finisher
                        .stamp_and_border(&rendered, caption, cfg.border, &cfg.color),
                )
                .await?;

            self.stage(
                Stage::Resize,
                &filename,
                self.finisher.resize(&stamped, cfg.width, cfg.height),
            )
            .await?
        };

        // 5. 上传；失败时仍尝试清理本地文件，但不提交记录
        let key = destination_key(&job.upload_dir, &filename);
        let url = match self
            .stage(Stage::Upload, &filename, self.uploader.upload(&key, &local_file))
            .await
        {
            Ok(url) => url,
            Err(e) => {
                if job.delete_local_file {
                    remove_local(&local_file).await;
                }
                return Err(e);
            }
        };
        tracing::info!(filename = %filename, key = %key, url = %url, "图片上传成功");

        // 6. 提交
        self.stage(
            Stage::Commit,
            &filename,
            self.store.update_status(&filename, StatusUpdate::ready(url.clone())),
        )
        .await?;

        // 7. 清理
        if job.delete_local_file {
            remove_local(&local_file).await;
        }

        Ok(GetImageOutcome { url, created: true })
    }

    /// 执行单个阶段：与退出信号竞争，并统一记录失败日志
    async fn stage<T, F>(&self, stage: Stage, subject: &str, fut: F) -> Result<T, ImageError>
    where
        F: Future<Output = Result<T, ImageError>>,
    {
        let res = match self.shutdown {
            Some(manager) => tokio::select! {
                biased;
                reason = manager.wait_for_shutdown() => {
                    tracing::warn!(stage = %stage, subject, "服务退出中（{:?}），中止图片生成", reason);
                    Err(ImageError::Cancelled(stage))
                }
                res = fut => res,
            },
            None => fut.await,
        };
        if let Err(e) = &res {
            tracing::error!(stage = %stage, subject, "图片生成阶段失败: {}", e);
        }
        res
    }
}

fn destination_key(upload_dir: &str, filename: &str) -> String {
    let dir = upload_dir.trim_matches('/');
    if dir.is_empty() {
        format!("{filename}.png")
    } else {
        format!("{dir}/{filename}.png")
    }
}

/// 目录创建失败只记录日志，渲染阶段会在目录确实不存在时报错
async fn ensure_dir(dir: &Path) {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        let err = ImageError::Directory(format!("{}: {e}", dir.display()));
        tracing::warn!("{}", err);
    }
}

/// 删除本地临时文件；失败只记录日志
async fn remove_local(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("已删除本地文件 {}", path.display()),
        Err(e) => {
            let err = ImageError::LocalCleanup(format!("{}: {e}", path.display()));
            tracing::warn!("{}", err);
        }
    }
}
