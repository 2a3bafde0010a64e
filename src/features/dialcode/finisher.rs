use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as base64_engine};
use image::imageops::FilterType;
use resvg::usvg::{self, Options as UsvgOptions, fontdb};
use resvg::{
    render,
    tiny_skia::{Pixmap, Transform},
};

use crate::error::ImageError;

use super::color::parse_hex_color;
use super::raster::write_rgba_png;
use super::renderer::MAX_IMAGE_SIDE;

static GLOBAL_FONT_DB: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

/// 获取全局字体数据库（系统字体，进程内只加载一次）
fn global_font_db() -> Arc<fontdb::Database> {
    GLOBAL_FONT_DB
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            if db.is_empty() {
                tracing::warn!("未找到系统字体，二维码下方文字将无法绘制");
            }
            Arc::new(db)
        })
        .clone()
}

/// 图片后处理：叠加文字与边框、缩放。均原地改写文件。
#[async_trait]
pub trait ImageFinisher: Send + Sync {
    async fn stamp_and_border(
        &self,
        path: &Path,
        text: &str,
        border_width: u32,
        color: &str,
    ) -> Result<PathBuf, ImageError>;

    async fn resize(&self, path: &Path, width: u32, height: u32) -> Result<PathBuf, ImageError>;
}

/// 通过 SVG 模板 + resvg 栅格化实现的后处理器
#[derive(Debug, Clone, Default)]
pub struct SvgFinisher;

impl SvgFinisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageFinisher for SvgFinisher {
    async fn stamp_and_border(
        &self,
        path: &Path,
        text: &str,
        border_width: u32,
        color: &str,
    ) -> Result<PathBuf, ImageError> {
        let path = path.to_path_buf();
        let text = text.to_string();
        let stroke = parse_hex_color(color)
            .ok_or_else(|| ImageError::Finish(format!("无法解析边框颜色: {color}")))?;

        tokio::task::spawn_blocking(move || -> Result<PathBuf, ImageError> {
            stamp_blocking(&path, &text, border_width, stroke)?;
            Ok(path)
        })
        .await
        .map_err(|e| ImageError::Finish(format!("后处理任务执行失败: {e}")))?
    }

    async fn resize(&self, path: &Path, width: u32, height: u32) -> Result<PathBuf, ImageError> {
        if width == 0 || height == 0 || width > MAX_IMAGE_SIDE || height > MAX_IMAGE_SIDE {
            return Err(ImageError::Finish(format!("非法的目标尺寸: {width}x{height}")));
        }
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<PathBuf, ImageError> {
            let img = image::open(&path)
                .map_err(|e| ImageError::Finish(format!("读取 {} 失败: {e}", path.display())))?;
            let resized = img.resize_exact(width, height, FilterType::Lanczos3).to_rgba8();
            write_rgba_png(&path, width, height, resized.as_raw()).map_err(ImageError::Finish)?;
            Ok(path)
        })
        .await
        .map_err(|e| ImageError::Finish(format!("缩放任务执行失败: {e}")))?
    }
}

fn stamp_blocking(path: &Path, text: &str, border: u32, stroke: [u8; 4]) -> Result<(), ImageError> {
    let text = text.trim();
    if border == 0 && text.is_empty() {
        return Ok(());
    }

    let bytes = fs::read(path)
        .map_err(|e| ImageError::Finish(format!("读取 {} 失败: {e}", path.display())))?;
    let raw = image::load_from_memory(&bytes)
        .map_err(|e| ImageError::Finish(format!("解码 {} 失败: {e}", path.display())))?
        .to_rgba8();
    let (w, h) = raw.dimensions();
    // 文字带沿用二维码静区的背景色
    let background = raw.get_pixel(0, 0).0;

    let band = if text.is_empty() { 0 } else { (w / 8).max(16) };
    let total_w = w + border * 2;
    let total_h = h + band + border * 2;
    if total_w > MAX_IMAGE_SIDE || total_h > MAX_IMAGE_SIDE {
        return Err(ImageError::Finish(format!("图片尺寸过大: {total_w}x{total_h}")));
    }

    let svg = build_stamp_svg(&StampLayout {
        png_base64: base64_engine.encode(&bytes),
        text,
        width: w,
        height: h,
        band,
        border,
        stroke,
        background,
    });

    let opts = UsvgOptions {
        fontdb: global_font_db(),
        font_family: "sans-serif".to_string(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_data(svg.as_bytes(), &opts)
        .map_err(|e| ImageError::Finish(format!("Failed to parse SVG: {e}")))?;
    let mut pixmap = Pixmap::new(total_w, total_h)
        .ok_or_else(|| ImageError::Finish("Failed to create pixmap".to_string()))?;
    render(&tree, Transform::default(), &mut pixmap.as_mut());

    let mut rgba = Vec::with_capacity((total_w * total_h * 4) as usize);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    write_rgba_png(path, total_w, total_h, &rgba).map_err(ImageError::Finish)
}

struct StampLayout<'a> {
    png_base64: String,
    text: &'a str,
    width: u32,
    height: u32,
    band: u32,
    border: u32,
    stroke: [u8; 4],
    background: [u8; 4],
}

fn build_stamp_svg(l: &StampLayout<'_>) -> String {
    let total_w = l.width + l.border * 2;
    let total_h = l.height + l.band + l.border * 2;
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{total_w}" height="{total_h}" viewBox="0 0 {total_w} {total_h}">"#
    );
    svg.push_str(&format!(
        r#"<rect x="0" y="0" width="{total_w}" height="{total_h}" {}/>"#,
        svg_fill(l.stroke)
    ));
    svg.push_str(&format!(
        r#"<rect x="{b}" y="{b}" width="{w}" height="{h}" {fill}/>"#,
        b = l.border,
        w = l.width,
        h = l.height + l.band,
        fill = svg_fill(l.background)
    ));
    svg.push_str(&format!(
        r#"<image x="{b}" y="{b}" width="{w}" height="{h}" href="data:image/png;base64,{data}"/>"#,
        b = l.border,
        w = l.width,
        h = l.height,
        data = l.png_base64
    ));
    if l.band > 0 {
        let font_size = (l.band as f32 * 0.7).round();
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{font_size}" font-family="sans-serif" text-anchor="middle" {fill}>{text}</text>"#,
            x = total_w as f32 / 2.0,
            y = (l.border + l.height) as f32 + l.band as f32 * 0.75,
            fill = svg_fill(l.stroke),
            text = escape_xml(l.text)
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn svg_fill(rgba: [u8; 4]) -> String {
    format!(
        r##"fill="#{:02x}{:02x}{:02x}" fill-opacity="{:.3}""##,
        rgba[0],
        rgba[1],
        rgba[2],
        rgba[3] as f32 / 255.0
    )
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
