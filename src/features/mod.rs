/// 拨号码二维码图片
pub mod dialcode;
/// 健康检查
pub mod health;
