use std::sync::Arc;

use axum::{Router, routing::get};
use dialcode_image::config::{AppConfig, LoggingConfig, UploadBackend};
use dialcode_image::features::dialcode::create_dialcode_router;
use dialcode_image::features::health::health_check;
use dialcode_image::openapi::ApiDoc;
use dialcode_image::startup::{build_image_service, run_startup_checks};
use dialcode_image::state::AppState;
use dialcode_image::ShutdownManager;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// local 上传后端对外提供静态文件的路径
const IMAGES_MOUNT: &str = "/images";

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "dialcode_image={lvl},tower_http={lvl}",
            lvl = logging.level
        )
        .into()
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("compact") {
        builder.compact().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    // 配置需先于日志加载（日志级别来自配置）
    if let Err(e) = AppConfig::init_global() {
        eprintln!("Config init failed: {e}");
        std::process::exit(1);
    }
    let config = AppConfig::global();
    init_tracing(&config.logging);
    tracing::info!("配置加载完成，监听 {}", config.server_addr());

    // 创建优雅退出管理器
    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler().await {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    // Run startup checks
    if let Err(e) = run_startup_checks(config).await {
        tracing::error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    let image_service = match build_image_service(config, &shutdown_manager).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("图片服务初始化失败: {}", e);
            std::process::exit(1);
        }
    };
    let app_state = AppState { image_service };

    // Routes
    let api_router = Router::<AppState>::new().merge(create_dialcode_router());
    let mut app = Router::<AppState>::new()
        .route("/health", get(health_check))
        .nest(&config.api.prefix, api_router)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    if config.upload.backend == UploadBackend::Local {
        app = app.nest_service(IMAGES_MOUNT, ServeDir::new(config.upload_local_dir()));
    }
    let app = app.with_state(app_state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!(
        "Dialcode API: http://{}{}/dialcode/image",
        addr,
        config.api.prefix
    );
    if config.upload.backend == UploadBackend::Local {
        tracing::info!("Images: http://{}{} -> {:?}", addr, IMAGES_MOUNT, config.upload_local_dir());
    }

    // 启动服务器并等待优雅退出信号
    let shutdown_config = &config.shutdown;
    let shutdown_for_signal = shutdown_manager.clone();
    let shutdown_signal = async move {
        let reason = shutdown_for_signal.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
    };

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
    });

    let reason = tokio::select! {
        res = &mut server => {
            report_server_exit(res);
            return;
        }
        reason = shutdown_manager.wait_for_shutdown() => reason,
    };

    // 进行中的流水线会在下一个阶段边界被取消，这里只限制收尾的总时长
    tracing::info!(
        "优雅退出超时时间: {}秒 ({:?})",
        shutdown_config.timeout_secs,
        reason
    );
    match tokio::time::timeout(shutdown_config.timeout_duration(), server).await {
        Ok(res) => report_server_exit(res),
        Err(_) => {
            tracing::warn!("优雅退出超时，强制退出");
            if shutdown_config.force_quit {
                tracing::info!("等待 {} 秒后强制退出", shutdown_config.force_delay_secs);
                tokio::time::sleep(shutdown_config.force_delay_duration()).await;
            }
            std::process::exit(1);
        }
    }
}

fn report_server_exit(res: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => tracing::info!("服务器已优雅关闭"),
        Ok(Err(e)) => {
            tracing::error!("服务器运行错误: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("服务器任务异常退出: {}", e);
            std::process::exit(1);
        }
    }
}
