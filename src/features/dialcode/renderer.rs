use std::path::{Path, PathBuf};

use async_trait::async_trait;
use qrcode::{Color, EcLevel, QrCode};

use crate::error::ImageError;

use super::color::parse_hex_color;
use super::image_config::ErrorCorrectionLevel;
use super::raster::write_rgba_png;

/// 单边像素上限，超出视为非法参数
pub const MAX_IMAGE_SIDE: u32 = 8192;

/// 渲染参数，减少函数参数数量
#[derive(Debug, Clone)]
pub struct RenderSpec<'a> {
    /// 输出 PNG 路径
    pub output: &'a Path,
    /// 编码进二维码的文本
    pub text: &'a str,
    pub color: &'a str,
    pub background_color: &'a str,
    pub error_correction_level: ErrorCorrectionLevel,
    /// 静区宽度（模块数）
    pub margin: u32,
}

/// 二维码渲染器：把文本渲染为本地 PNG 文件
#[async_trait]
pub trait QrRenderer: Send + Sync {
    async fn render(&self, spec: &RenderSpec<'_>) -> Result<PathBuf, ImageError>;
}

impl From<ErrorCorrectionLevel> for EcLevel {
    fn from(level: ErrorCorrectionLevel) -> Self {
        match level {
            ErrorCorrectionLevel::L => EcLevel::L,
            ErrorCorrectionLevel::M => EcLevel::M,
            ErrorCorrectionLevel::Q => EcLevel::Q,
            ErrorCorrectionLevel::H => EcLevel::H,
        }
    }
}

/// 基于 qrcode crate 的 PNG 渲染器
#[derive(Debug, Clone)]
pub struct QrPngRenderer {
    /// 每个模块的像素边长
    module_size: u32,
}

impl QrPngRenderer {
    pub fn new(module_size: u32) -> Self {
        Self {
            module_size: module_size.max(1),
        }
    }
}

impl Default for QrPngRenderer {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl QrRenderer for QrPngRenderer {
    async fn render(&self, spec: &RenderSpec<'_>) -> Result<PathBuf, ImageError> {
        let output = spec.output.to_path_buf();
        let text = spec.text.to_string();
        let fg = parse_hex_color(spec.color)
            .ok_or_else(|| ImageError::Render(format!("无法解析前景色: {}", spec.color)))?;
        let bg = parse_hex_color(spec.background_color).ok_or_else(|| {
            ImageError::Render(format!("无法解析背景色: {}", spec.background_color))
        })?;
        let level = spec.error_correction_level;
        let margin = spec.margin;
        let module = self.module_size;

        // 编码与栅格化是 CPU 密集操作，移出 tokio worker
        tokio::task::spawn_blocking(move || -> Result<PathBuf, ImageError> {
            render_qr_png(&output, &text, fg, bg, level, margin, module)?;
            Ok(output)
        })
        .await
        .map_err(|e| ImageError::Render(format!("渲染任务执行失败: {e}")))?
    }
}

fn render_qr_png(
    output: &Path,
    text: &str,
    fg: [u8; 4],
    bg: [u8; 4],
    level: ErrorCorrectionLevel,
    margin: u32,
    module: u32,
) -> Result<(), ImageError> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), level.into())
        .map_err(|e| ImageError::Render(format!("二维码编码失败: {e}")))?;
    let modules = code.width() as u32;
    let colors = code.to_colors();

    let side_modules = margin
        .checked_mul(2)
        .and_then(|m| modules.checked_add(m))
        .ok_or_else(|| ImageError::Render(format!("静区过宽: {margin} 模块")))?;
    let side = side_modules
        .checked_mul(module)
        .filter(|s| *s <= MAX_IMAGE_SIDE)
        .ok_or_else(|| ImageError::Render(format!("图片尺寸过大: {side_modules} 模块")))?;
    // 二维码区域右/下边界（模块坐标），已由上面的检查保证不溢出
    let end = margin + modules;

    let mut rgba = Vec::with_capacity((side * side * 4) as usize);
    for py in 0..side {
        let my = py / module;
        for px in 0..side {
            let mx = px / module;
            let dark = mx >= margin
                && my >= margin
                && mx < end
                && my < end
                && colors[((my - margin) * modules + (mx - margin)) as usize] == Color::Dark;
            rgba.extend_from_slice(if dark { &fg } else { &bg });
        }
    }

    write_rgba_png(output, side, side, &rgba).map_err(ImageError::Render)
}
