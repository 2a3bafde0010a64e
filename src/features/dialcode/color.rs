//! 颜色解析：CMYK → 十六进制转换，以及十六进制颜色 → RGBA。

/// 将 `c,m,y,k` 或 `cmyk(c,m,y,k)`（各分量 0~100）转换为 `#rrggbb`。
///
/// 不是 CMYK 形式时返回 None。
pub fn cmyk_to_hex(input: &str) -> Option<String> {
    let raw = input.trim();
    let inner = raw
        .strip_prefix("cmyk(")
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(raw);

    let parts: Vec<f64> = inner
        .split(',')
        .map(|p| p.trim().trim_end_matches('%').parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let [c, m, y, k] = parts.as_slice() else {
        return None;
    };
    if [c, m, y, k].iter().any(|v| !(0.0..=100.0).contains(*v)) {
        return None;
    }

    let channel = |v: f64| -> u8 { (255.0 * (1.0 - v / 100.0) * (1.0 - k / 100.0)).round() as u8 };
    Some(format!(
        "#{:02x}{:02x}{:02x}",
        channel(*c),
        channel(*m),
        channel(*y)
    ))
}

/// 规范化前景色：CMYK 转为十六进制，其余原样保留。
pub fn normalize_color(input: &str) -> String {
    cmyk_to_hex(input).unwrap_or_else(|| input.trim().to_string())
}

/// 解析 `#rgb` / `#rgba` / `#rrggbb` / `#rrggbbaa` 为 RGBA。
pub fn parse_hex_color(input: &str) -> Option<[u8; 4]> {
    let hex = input.trim().strip_prefix('#')?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some([nibble(0)?, nibble(1)?, nibble(2)?, 0xFF]),
        4 => Some([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?]),
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 0xFF]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmyk_black_and_white() {
        assert_eq!(cmyk_to_hex("0,0,0,100").as_deref(), Some("#000000"));
        assert_eq!(cmyk_to_hex("cmyk(0, 0, 0, 0)").as_deref(), Some("#ffffff"));
        assert_eq!(cmyk_to_hex("100,0,0,0").as_deref(), Some("#00ffff"));
    }

    #[test]
    fn non_cmyk_passes_through() {
        assert_eq!(cmyk_to_hex("#123456"), None);
        assert_eq!(cmyk_to_hex("1,2,3"), None);
        assert_eq!(cmyk_to_hex("0,0,0,150"), None);
        assert_eq!(normalize_color(" #abc "), "#abc");
    }

    #[test]
    fn hex_forms() {
        assert_eq!(parse_hex_color("#000"), Some([0, 0, 0, 255]));
        assert_eq!(parse_hex_color("#ffff"), Some([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("#ff000080"), Some([255, 0, 0, 128]));
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }
}
