use std::fs;
use std::path::Path;

/// 使用 png crate 将 RGBA8 像素编码为 PNG 并写入文件。
pub(crate) fn write_rgba_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<(), String> {
    let mut out = Vec::with_capacity((width * height * 4) as usize);
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Default);
        let mut writer = encoder
            .write_header()
            .map_err(|e| format!("PNG header: {e}"))?;
        writer
            .write_image_data(rgba)
            .map_err(|e| format!("PNG data: {e}"))?;
    }
    fs::write(path, &out).map_err(|e| format!("写入 {} 失败: {e}", path.display()))
}
