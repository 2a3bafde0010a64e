use std::path::Path;

use async_trait::async_trait;
use sqlx::{ConnectOptions, Row, SqlitePool, sqlite::SqliteConnectOptions, sqlite::SqliteRow};

use crate::error::ImageError;

use super::image_config::CanonicalConfig;
use super::models::{ImageRecord, ImageStatus, NewImageRecord, Scope, StatusUpdate};

/// 图片记录存储抽象
#[async_trait]
pub trait ImageRecordStore: Send + Sync {
    /// 写入一条 Pending 记录，返回其文件名
    async fn insert(&self, record: &NewImageRecord) -> Result<String, ImageError>;

    /// 查询 (dialcode, scope) 下所有 Ready 记录；配置比较由调用方在内存中完成
    async fn find_ready(&self, dialcode: &str, scope: &Scope)
    -> Result<Vec<ImageRecord>, ImageError>;

    /// 按文件名更新状态。只允许 Pending -> Ready，且只生效一次
    async fn update_status(&self, filename: &str, update: StatusUpdate) -> Result<(), ImageError>;
}

#[derive(Clone)]
pub struct SqliteImageStore {
    pub pool: SqlitePool,
}

impl SqliteImageStore {
    pub async fn connect_sqlite(path: &str, wal: bool) -> Result<Self, ImageError> {
        let opt = SqliteConnectOptions::new()
            .filename(Path::new(path))
            .create_if_missing(true)
            .log_statements(tracing::log::LevelFilter::Off);
        let pool = SqlitePool::connect_with(opt)
            .await
            .map_err(|e| ImageError::Store(format!("sqlite connect: {e}")))?;
        if wal {
            sqlx::query("PRAGMA journal_mode=WAL;")
                .execute(&pool)
                .await
                .ok();
        }
        sqlx::query("PRAGMA synchronous=NORMAL;")
            .execute(&pool)
            .await
            .ok();
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<(), ImageError> {
        let ddl = r#"
        CREATE TABLE IF NOT EXISTS dialcode_images (
            filename TEXT PRIMARY KEY,
            dialcode TEXT NOT NULL,
            channel TEXT NOT NULL,
            publisher TEXT NOT NULL,
            config TEXT NOT NULL,
            status TEXT NOT NULL,
            url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_dialcode_images_lookup
            ON dialcode_images(dialcode, channel, publisher, status);
        "#;
        sqlx::query(ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| ImageError::Store(format!("init schema: {e}")))?;
        Ok(())
    }

    /// 按文件名读取单条记录（无论状态）
    pub async fn find_by_filename(&self, filename: &str) -> Result<Option<ImageRecord>, ImageError> {
        let row = sqlx::query(
            "SELECT filename, dialcode, channel, publisher, config, status, url, created_at, updated_at \
             FROM dialcode_images WHERE filename = ?",
        )
        .bind(filename)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ImageError::Store(format!("find by filename: {e}")))?;
        row.map(|r| record_from_row(&r)).transpose()
    }
}

fn record_from_row(r: &SqliteRow) -> Result<ImageRecord, ImageError> {
    let filename: String = r.get("filename");
    let raw_status: String = r.get("status");
    let status = ImageStatus::parse(&raw_status)
        .ok_or_else(|| ImageError::Store(format!("未知状态 {raw_status} (filename={filename})")))?;
    let raw_config: String = r.get("config");
    let config = CanonicalConfig::from_json(&raw_config)
        .map_err(|e| ImageError::Store(format!("配置解析失败 (filename={filename}): {e}")))?;
    Ok(ImageRecord {
        dialcode: r.get("dialcode"),
        scope: Scope::new(r.get::<String, _>("channel"), r.get::<String, _>("publisher")),
        config,
        status,
        filename,
        url: r.try_get::<Option<String>, _>("url").ok().flatten(),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

#[async_trait]
impl ImageRecordStore for SqliteImageStore {
    async fn insert(&self, record: &NewImageRecord) -> Result<String, ImageError> {
        let config = record
            .config
            .to_json()
            .map_err(|e| ImageError::Store(format!("serialize config: {e}")))?;
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO dialcode_images(filename,dialcode,channel,publisher,config,status,url,created_at,updated_at) \
             VALUES(?,?,?,?,?,?,NULL,?,?)",
        )
        .bind(&record.filename)
        .bind(&record.dialcode)
        .bind(&record.scope.namespace)
        .bind(&record.scope.owner)
        .bind(config)
        .bind(ImageStatus::Pending.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ImageError::Store(format!("insert image record: {e}")))?;
        Ok(record.filename.clone())
    }

    async fn find_ready(
        &self,
        dialcode: &str,
        scope: &Scope,
    ) -> Result<Vec<ImageRecord>, ImageError> {
        let rows = sqlx::query(
            "SELECT filename, dialcode, channel, publisher, config, status, url, created_at, updated_at \
             FROM dialcode_images \
             WHERE dialcode = ? AND channel = ? AND publisher = ? AND status = ? \
             ORDER BY created_at ASC, filename ASC",
        )
        .bind(dialcode)
        .bind(&scope.namespace)
        .bind(&scope.owner)
        .bind(ImageStatus::Ready.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ImageError::Store(format!("query ready images: {e}")))?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match record_from_row(&r) {
                Ok(rec) => out.push(rec),
                // 单条脏数据不影响其余记录参与比较
                Err(e) => tracing::warn!("跳过无法解析的图片记录: {}", e),
            }
        }
        Ok(out)
    }

    async fn update_status(&self, filename: &str, update: StatusUpdate) -> Result<(), ImageError> {
        if update.status != ImageStatus::Ready {
            return Err(ImageError::Store(format!(
                "不支持的状态迁移: -> {} (filename={filename})",
                update.status.as_str()
            )));
        }
        let url = update
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ImageError::Store(format!("Ready 状态缺少 url (filename={filename})")))?;

        let now = chrono::Utc::now().to_rfc3339();
        let res = sqlx::query(
            "UPDATE dialcode_images SET status = ?, url = ?, updated_at = ? \
             WHERE filename = ? AND status = ?",
        )
        .bind(ImageStatus::Ready.as_str())
        .bind(&url)
        .bind(&now)
        .bind(filename)
        .bind(ImageStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| ImageError::Store(format!("update image status: {e}")))?;

        if res.rows_affected() == 0 {
            return Err(ImageError::Store(format!(
                "记录不存在或已是 Ready (filename={filename})"
            )));
        }
        Ok(())
    }
}
