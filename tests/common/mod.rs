#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dialcode_image::{ImageError, ShutdownManager, ShutdownReason};
use dialcode_image::features::dialcode::finisher::ImageFinisher;
use dialcode_image::features::dialcode::models::{NewImageRecord, StatusUpdate};
use dialcode_image::features::dialcode::renderer::{QrRenderer, RenderSpec};
use dialcode_image::features::dialcode::store::ImageRecordStore;
use dialcode_image::features::dialcode::uploader::{ImageUploader, public_url};
use dialcode_image::features::dialcode::{
    ImageCollaborators, ImageRecord, ImageService, ImageServiceSettings, ImageStatus, Scope,
};

pub const PUBLIC_BASE: &str = "http://cdn.test";
pub const REGISTRY_URL: &str = "https://dial.test/dial/";

/// 按调用顺序记录协作方调用
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// 各协作方的故障开关，默认全部正常
#[derive(Clone, Default)]
pub struct Faults {
    pub lookup: bool,
    pub reserve: bool,
    pub render: bool,
    pub stamp: bool,
    pub resize: bool,
    pub upload: bool,
    pub commit: bool,
    /// 上传成功后删掉本地文件，使随后的清理失败
    pub upload_consumes_file: bool,
    /// 预留成功后立即触发退出
    pub shutdown_after_reserve: Option<ShutdownManager>,
}

/// 内存版记录存储，语义与 SQLite 实现一致
#[derive(Default)]
pub struct MemoryStore {
    pub log: CallLog,
    pub records: Mutex<Vec<ImageRecord>>,
    pub fail_lookup: bool,
    pub fail_reserve: bool,
    pub fail_commit: bool,
    pub shutdown_after_reserve: Option<ShutdownManager>,
}

impl MemoryStore {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn record(&self, filename: &str) -> Option<ImageRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.filename == filename)
            .cloned()
    }

    pub fn all(&self) -> Vec<ImageRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageRecordStore for MemoryStore {
    async fn insert(&self, record: &NewImageRecord) -> Result<String, ImageError> {
        self.log.push("reserve");
        if self.fail_reserve {
            return Err(ImageError::Store("disk I/O error".into()));
        }
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.filename == record.filename) {
            return Err(ImageError::Store(format!("duplicate {}", record.filename)));
        }
        records.push(ImageRecord {
            dialcode: record.dialcode.clone(),
            scope: record.scope.clone(),
            config: record.config.clone(),
            status: ImageStatus::Pending,
            filename: record.filename.clone(),
            url: None,
            created_at: String::new(),
            updated_at: String::new(),
        });
        if let Some(shutdown) = &self.shutdown_after_reserve {
            shutdown.trigger_shutdown(ShutdownReason::Application);
        }
        Ok(record.filename.clone())
    }

    async fn find_ready(&self, dialcode: &str, scope: &Scope) -> Result<Vec<ImageRecord>, ImageError> {
        self.log.push("lookup");
        if self.fail_lookup {
            return Err(ImageError::Store("database is locked".into()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.dialcode == dialcode && &r.scope == scope && r.status == ImageStatus::Ready)
            .cloned()
            .collect())
    }

    async fn update_status(&self, filename: &str, update: StatusUpdate) -> Result<(), ImageError> {
        self.log.push("commit");
        if self.fail_commit {
            return Err(ImageError::Store("database is locked".into()));
        }
        let mut records = self.records.lock().unwrap();
        let rec = records
            .iter_mut()
            .find(|r| r.filename == filename && r.status == ImageStatus::Pending)
            .ok_or_else(|| ImageError::Store(format!("no pending record {filename}")))?;
        rec.status = update.status;
        rec.url = update.url;
        Ok(())
    }
}

/// 渲染器替身：写出占位文件
pub struct FakeRenderer {
    pub log: CallLog,
    pub texts: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl QrRenderer for FakeRenderer {
    async fn render(&self, spec: &RenderSpec<'_>) -> Result<PathBuf, ImageError> {
        self.log.push("render");
        self.texts.lock().unwrap().push(spec.text.to_string());
        if self.fail {
            return Err(ImageError::Render("data too long".into()));
        }
        tokio::fs::write(spec.output, b"fake-png")
            .await
            .map_err(|e| ImageError::Render(e.to_string()))?;
        Ok(spec.output.to_path_buf())
    }
}

/// 后处理替身：记录调用参数，不改动文件
pub struct FakeFinisher {
    pub log: CallLog,
    pub stamps: Mutex<Vec<(String, u32)>>,
    pub sizes: Mutex<Vec<(u32, u32)>>,
    pub fail_stamp: bool,
    pub fail_resize: bool,
}

#[async_trait]
impl ImageFinisher for FakeFinisher {
    async fn stamp_and_border(
        &self,
        path: &Path,
        text: &str,
        border_width: u32,
        _color: &str,
    ) -> Result<PathBuf, ImageError> {
        self.log.push("finish");
        self.stamps.lock().unwrap().push((text.to_string(), border_width));
        if self.fail_stamp {
            return Err(ImageError::Finish("font not found".into()));
        }
        Ok(path.to_path_buf())
    }

    async fn resize(&self, path: &Path, width: u32, height: u32) -> Result<PathBuf, ImageError> {
        self.log.push("resize");
        self.sizes.lock().unwrap().push((width, height));
        if self.fail_resize {
            return Err(ImageError::Finish("decode failed".into()));
        }
        Ok(path.to_path_buf())
    }
}

/// 上传替身：可配置为失败
pub struct FakeUploader {
    pub log: CallLog,
    pub fail: bool,
    pub consume_file: bool,
    pub keys: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageUploader for FakeUploader {
    async fn upload(&self, destination_key: &str, local_path: &Path) -> Result<String, ImageError> {
        self.log.push("upload");
        if self.fail {
            return Err(ImageError::Upload("gateway returned 503".into()));
        }
        if !local_path.exists() {
            return Err(ImageError::Upload(format!("missing {}", local_path.display())));
        }
        self.keys.lock().unwrap().push(destination_key.to_string());
        if self.consume_file {
            tokio::fs::remove_file(local_path)
                .await
                .map_err(|e| ImageError::Upload(e.to_string()))?;
        }
        Ok(public_url(PUBLIC_BASE, destination_key))
    }
}

/// 测试夹具：假协作方 + 独立临时目录
pub struct Harness {
    pub log: CallLog,
    pub store: Arc<MemoryStore>,
    pub renderer: Arc<FakeRenderer>,
    pub finisher: Arc<FakeFinisher>,
    pub uploader: Arc<FakeUploader>,
    pub temp_root: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_faults(Faults::default())
    }

    pub fn with_failing_upload() -> Self {
        Self::with_faults(Faults {
            upload: true,
            ..Faults::default()
        })
    }

    pub fn with_failing_lookup() -> Self {
        Self::with_faults(Faults {
            lookup: true,
            ..Faults::default()
        })
    }

    pub fn with_faults(faults: Faults) -> Self {
        let log = CallLog::default();
        let store = MemoryStore {
            fail_lookup: faults.lookup,
            fail_reserve: faults.reserve,
            fail_commit: faults.commit,
            shutdown_after_reserve: faults.shutdown_after_reserve,
            ..MemoryStore::with_log(log.clone())
        };
        Self {
            store: Arc::new(store),
            renderer: Arc::new(FakeRenderer {
                log: log.clone(),
                texts: Mutex::new(Vec::new()),
                fail: faults.render,
            }),
            finisher: Arc::new(FakeFinisher {
                log: log.clone(),
                stamps: Mutex::new(Vec::new()),
                sizes: Mutex::new(Vec::new()),
                fail_stamp: faults.stamp,
                fail_resize: faults.resize,
            }),
            uploader: Arc::new(FakeUploader {
                log: log.clone(),
                fail: faults.upload,
                consume_file: faults.upload_consumes_file,
                keys: Mutex::new(Vec::new()),
            }),
            temp_root: std::env::temp_dir().join(format!("dialcode_{}", uuid::Uuid::new_v4())),
            log,
        }
    }

    pub fn service(&self) -> ImageService {
        ImageService::new(
            ImageCollaborators {
                store: self.store.clone(),
                renderer: self.renderer.clone(),
                finisher: self.finisher.clone(),
                uploader: self.uploader.clone(),
            },
            ImageServiceSettings {
                temp_folder: self.temp_root.clone(),
                registry_url: REGISTRY_URL.to_string(),
            },
        )
    }

    /// 默认本地目录下某个文件名对应的路径
    pub fn local_file(&self, scope: &Scope, filename: &str) -> PathBuf {
        self.temp_root
            .join(&scope.namespace)
            .join(&scope.owner)
            .join(format!("{filename}.png"))
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.temp_root);
    }
}
