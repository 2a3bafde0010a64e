use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::ImageError;
use crate::shutdown::ShutdownManager;

use super::finisher::ImageFinisher;
use super::image_config::ImageConfig;
use super::lookup::find_cached;
use super::models::{GetImageOptions, GetImageOutcome, Scope};
use super::pipeline::{GenerationPipeline, PipelineJob};
use super::renderer::QrRenderer;
use super::store::ImageRecordStore;
use super::uploader::ImageUploader;

/// 服务级配置
#[derive(Debug, Clone)]
pub struct ImageServiceSettings {
    /// 本地临时目录根，默认按 `<temp_folder>/<channel>/<publisher>` 存放
    pub temp_folder: PathBuf,
    /// 二维码内容前缀，编码内容 = registry_url + dialcode
    pub registry_url: String,
}

/// 协作方集合，便于测试时整体替换
#[derive(Clone)]
pub struct ImageCollaborators {
    pub store: Arc<dyn ImageRecordStore>,
    pub renderer: Arc<dyn QrRenderer>,
    pub finisher: Arc<dyn ImageFinisher>,
    pub uploader: Arc<dyn ImageUploader>,
}

/// 拨号码二维码图片服务：先查缓存，未命中再走生成流水线。
#[derive(Clone)]
pub struct ImageService {
    deps: ImageCollaborators,
    settings: ImageServiceSettings,
    render_permits: Arc<Semaphore>,
    shutdown: Option<ShutdownManager>,
}

impl ImageService {
    pub fn new(deps: ImageCollaborators, settings: ImageServiceSettings) -> Self {
        Self {
            deps,
            settings,
            render_permits: Arc::new(Semaphore::new(default_render_permits())),
            shutdown: None,
        }
    }

    /// 限制同时进行渲染/后处理的任务数
    pub fn with_render_permits(mut self, permits: usize) -> Self {
        self.render_permits = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    /// 绑定退出信号，退出时进行中的流水线在下一个阶段边界中止
    pub fn with_shutdown(mut self, shutdown: ShutdownManager) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// 获取（必要时生成）拨号码图片的公开地址
    pub async fn get_image(
        &self,
        dialcode: &str,
        scope: &Scope,
        config: &ImageConfig,
        options: GetImageOptions,
    ) -> Result<GetImageOutcome, ImageError> {
        let canonical = config.canonical();

        if let Some(hit) = find_cached(self.deps.store.as_ref(), dialcode, scope, &canonical).await
            && let Some(url) = hit.url
        {
            tracing::info!(
                dialcode,
                channel = %scope.namespace,
                publisher = %scope.owner,
                filename = %hit.filename,
                "命中已生成图片"
            );
            return Ok(GetImageOutcome {
                url,
                created: false,
            });
        }

        let local_dir = options.local_path.unwrap_or_else(|| {
            self.settings
                .temp_folder
                .join(&scope.namespace)
                .join(&scope.owner)
        });
        let upload_dir = options
            .upload_path
            .unwrap_or_else(|| format!("{}/{}", scope.namespace, scope.owner));

        let pipeline = GenerationPipeline {
            store: self.deps.store.as_ref(),
            renderer: self.deps.renderer.as_ref(),
            finisher: self.deps.finisher.as_ref(),
            uploader: self.deps.uploader.as_ref(),
            render_permits: &self.render_permits,
            shutdown: self.shutdown.as_ref(),
            registry_url: &self.settings.registry_url,
        };
        pipeline
            .run(PipelineJob {
                dialcode,
                scope,
                config,
                canonical,
                local_dir,
                upload_dir,
                delete_local_file: options.delete_local_file,
            })
            .await
    }
}

fn default_render_permits() -> usize {
    num_cpus::get().max(1)
}
