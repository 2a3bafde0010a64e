/// 启动检查工具模块
pub mod checks;
/// 协作方装配
pub mod services;

pub use checks::run_startup_checks;
pub use services::build_image_service;
