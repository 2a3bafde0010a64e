use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        3939
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 未设置时生效）
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 日志格式：full / compact
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_format() -> String {
        "full".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
        }
    }
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀
    #[serde(default = "ApiConfig::default_prefix")]
    pub prefix: String,
}

impl ApiConfig {
    fn default_prefix() -> String {
        "/api/v1".to_string()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
        }
    }
}

/// 图片记录存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite 文件路径
    #[serde(default = "StorageConfig::default_sqlite_path")]
    pub sqlite_path: String,
    /// 是否启用 WAL
    #[serde(default = "StorageConfig::default_sqlite_wal")]
    pub sqlite_wal: bool,
}

impl StorageConfig {
    fn default_sqlite_path() -> String {
        "./resources/dialcode_images.db".to_string()
    }
    fn default_sqlite_wal() -> bool {
        true
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: Self::default_sqlite_path(),
            sqlite_wal: Self::default_sqlite_wal(),
        }
    }
}

/// 拨号码生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialcodeConfig {
    /// 本地临时目录根
    #[serde(default = "DialcodeConfig::default_temp_folder")]
    pub temp_folder: String,
    /// 二维码内容前缀（内容 = registry_url + dialcode）
    #[serde(default = "DialcodeConfig::default_registry_url")]
    pub registry_url: String,
}

impl DialcodeConfig {
    fn default_temp_folder() -> String {
        "./resources/tmp".to_string()
    }
    fn default_registry_url() -> String {
        "https://dial.example.com/dial/".to_string()
    }
}

impl Default for DialcodeConfig {
    fn default() -> Self {
        Self {
            temp_folder: Self::default_temp_folder(),
            registry_url: Self::default_registry_url(),
        }
    }
}

/// 上传后端
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    /// 复制到本地目录，由本服务以 `/images` 静态路径对外提供
    #[default]
    Local,
    /// HTTP PUT 到对象存储网关
    Http,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub backend: UploadBackend,
    /// 公开访问基地址，返回的 url = 基地址 + "/" + 目标键
    #[serde(default = "UploadConfig::default_public_base_url")]
    pub public_base_url: String,
    /// local 后端的存储根目录
    #[serde(default = "UploadConfig::default_local_dir")]
    pub local_dir: String,
    /// http 后端的 PUT 基地址
    #[serde(default)]
    pub http_endpoint: String,
    /// http 后端的 Bearer Token（可选）
    #[serde(default)]
    pub http_token: Option<String>,
    /// http 后端请求超时（秒）
    #[serde(default = "UploadConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl UploadConfig {
    fn default_public_base_url() -> String {
        "http://localhost:3939/images".to_string()
    }
    fn default_local_dir() -> String {
        "./resources/images".to_string()
    }
    fn default_timeout() -> u64 {
        30
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            backend: UploadBackend::default(),
            public_base_url: Self::default_public_base_url(),
            local_dir: Self::default_local_dir(),
            http_endpoint: String::new(),
            http_token: None,
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 图片渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRenderConfig {
    /// 最大并行渲染数（0 表示按 CPU 核数）
    #[serde(default)]
    pub max_parallel: u32,
    /// 单个二维码模块的像素边长
    #[serde(default = "ImageRenderConfig::default_module_size")]
    pub module_size_px: u32,
}

impl ImageRenderConfig {
    fn default_module_size() -> u32 {
        10
    }

    /// 实际生效的并行渲染数
    pub fn effective_parallel(&self) -> usize {
        match self.max_parallel {
            0 => num_cpus::get().max(1),
            m => m as usize,
        }
    }
}

impl Default for ImageRenderConfig {
    fn default() -> Self {
        Self {
            max_parallel: 0,
            module_size_px: Self::default_module_size(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
    /// 是否启用强制退出
    #[serde(default = "ShutdownConfig::default_force")]
    pub force_quit: bool,
    /// 强制退出前的等待时间（秒）
    #[serde(default = "ShutdownConfig::default_force_delay")]
    pub force_delay_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }
    fn default_force() -> bool {
        true
    }
    fn default_force_delay() -> u64 {
        10
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 获取强制退出等待时间
    pub fn force_delay_duration(&self) -> Duration {
        Duration::from_secs(self.force_delay_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
            force_quit: Self::default_force(),
            force_delay_secs: Self::default_force_delay(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// 图片记录存储
    #[serde(default)]
    pub storage: StorageConfig,
    /// 拨号码生成
    #[serde(default)]
    pub dialcode: DialcodeConfig,
    /// 上传后端
    #[serde(default)]
    pub upload: UploadConfig,
    /// 图片渲染
    #[serde(default)]
    pub image: ImageRenderConfig,
    /// 优雅退出
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    ///
    /// 配置文件不存在时全部使用默认值。
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(Self::env_source())
            .build()?;

        builder.try_deserialize()
    }

    /// 环境变量覆盖源，例如：APP_API__PREFIX、APP_UPLOAD__PUBLIC_BASE_URL
    ///
    /// 段与字段之间用双下划线分隔，字段名自身的单下划线保持不变。
    fn env_source() -> Environment {
        Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// 获取全局配置单例
    ///
    /// 仅供二进制入口在 `init_global()` 之后调用。
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径
    fn get_config_path() -> PathBuf {
        std::env::var_os("APP_CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 本地临时目录根
    pub fn temp_folder(&self) -> PathBuf {
        PathBuf::from(&self.dialcode.temp_folder)
    }

    /// local 上传后端的存储根目录
    pub fn upload_local_dir(&self) -> PathBuf {
        PathBuf::from(&self.upload.local_dir)
    }
}
