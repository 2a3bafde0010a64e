//! 渲染参数规范化：把请求中的可选配置补齐默认值，并生成可比较的规范形式。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::color::normalize_color;

pub const DEFAULT_COLOR: &str = "#000";
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffff";
pub const DEFAULT_WIDTH: u32 = 30;
pub const DEFAULT_HEIGHT: u32 = 30;
pub const DEFAULT_MARGIN: u32 = 2;
pub const DEFAULT_BORDER: u32 = 20;

/// 请求中的单个配置值：调用方可能传字符串、数字或布尔值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ConfigValue {
    /// 非空值的字符串形式；空串、0、false 视为未提供。
    fn as_text(&self) -> Option<String> {
        match self {
            ConfigValue::Bool(false) => None,
            ConfigValue::Bool(true) => Some("true".to_string()),
            ConfigValue::Number(n) if *n == 0.0 || !n.is_finite() => None,
            ConfigValue::Number(n) => Some(n.to_string()),
            ConfigValue::Text(s) if s.trim().is_empty() => None,
            ConfigValue::Text(s) => Some(s.clone()),
        }
    }

    /// 解析为正整数（与 parseInt 一致：取前导数字），0 或无法解析时返回 None。
    fn as_positive_u32(&self) -> Option<u32> {
        let v = match self {
            ConfigValue::Number(n) if n.is_finite() && *n >= 1.0 => n.trunc().min(u32::MAX as f64) as u32,
            ConfigValue::Text(s) => {
                let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<u32>().ok()?
            }
            _ => return None,
        };
        (v > 0).then_some(v)
    }

    /// 静区宽度：非空字符串 "0" 视为显式指定 0，数值 0 仍视为未提供。
    fn as_margin(&self) -> Option<u32> {
        match self {
            ConfigValue::Text(s) => {
                let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<u32>().ok()
            }
            other => other.as_positive_u32(),
        }
    }

    /// 是否为显式的关闭标记（字符串 "false" 或布尔 false）。
    fn is_false_flag(&self) -> bool {
        match self {
            ConfigValue::Bool(b) => !b,
            ConfigValue::Text(s) => s == "false",
            ConfigValue::Number(_) => false,
        }
    }
}

/// 请求携带的原始渲染配置，所有字段可缺省。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfigInput {
    /// 前景色（支持 `#hex` 或 CMYK `c,m,y,k`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub color: Option<ConfigValue>,
    /// 背景色
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub background_color: Option<ConfigValue>,
    /// 最终宽度（像素）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub width: Option<ConfigValue>,
    /// 最终高度（像素）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub height: Option<ConfigValue>,
    /// 二维码静区（模块数）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub margin: Option<ConfigValue>,
    /// 传 "false" 关闭边框
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub border: Option<ConfigValue>,
    /// 传 "false" 不叠加文字
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub show_text: Option<ConfigValue>,
    /// 纠错级别 L/M/Q/H（兼容旧字段 errCorrectionLevel / quality）
    ///
    /// 三个字段名互为别名，同一请求里出现多个会被当作重复字段拒绝（400）。
    #[serde(
        default,
        alias = "errCorrectionLevel",
        alias = "quality",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>)]
    pub error_correction_level: Option<ConfigValue>,
}

/// 二维码纠错级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCorrectionLevel {
    L,
    M,
    Q,
    #[default]
    H,
}

impl ErrorCorrectionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCorrectionLevel::L => "L",
            ErrorCorrectionLevel::M => "M",
            ErrorCorrectionLevel::Q => "Q",
            ErrorCorrectionLevel::H => "H",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "L" => Some(ErrorCorrectionLevel::L),
            "M" => Some(ErrorCorrectionLevel::M),
            "Q" => Some(ErrorCorrectionLevel::Q),
            "H" => Some(ErrorCorrectionLevel::H),
            _ => None,
        }
    }
}

/// 补齐默认值后的渲染配置（数值字段使用原生类型）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub color: String,
    pub background_color: String,
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    /// 边框宽度，0 表示无边框
    pub border: u32,
    pub show_text: bool,
    pub error_correction_level: ErrorCorrectionLevel,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self::from_input(&ImageConfigInput::default())
    }
}

impl ImageConfig {
    pub fn from_input(input: &ImageConfigInput) -> Self {
        let text = |v: &Option<ConfigValue>| v.as_ref().and_then(ConfigValue::as_text);
        let number = |v: &Option<ConfigValue>, default: u32| {
            v.as_ref()
                .and_then(ConfigValue::as_positive_u32)
                .unwrap_or(default)
        };
        let disabled = |v: &Option<ConfigValue>| v.as_ref().is_some_and(ConfigValue::is_false_flag);

        Self {
            color: text(&input.color)
                .map(|c| normalize_color(&c))
                .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            background_color: text(&input.background_color)
                .unwrap_or_else(|| DEFAULT_BACKGROUND_COLOR.to_string()),
            width: number(&input.width, DEFAULT_WIDTH),
            height: number(&input.height, DEFAULT_HEIGHT),
            margin: input
                .margin
                .as_ref()
                .and_then(ConfigValue::as_margin)
                .unwrap_or(DEFAULT_MARGIN),
            border: if disabled(&input.border) { 0 } else { DEFAULT_BORDER },
            show_text: !disabled(&input.show_text),
            error_correction_level: text(&input.error_correction_level)
                .and_then(|v| ErrorCorrectionLevel::parse(&v))
                .unwrap_or_default(),
        }
    }

    /// 规范形式：字段名 → 字符串值，作为缓存键的一部分。
    pub fn canonical(&self) -> CanonicalConfig {
        let mut map = BTreeMap::new();
        map.insert("color".to_string(), self.color.clone());
        map.insert("backgroundColor".to_string(), self.background_color.clone());
        map.insert("width".to_string(), self.width.to_string());
        map.insert("height".to_string(), self.height.to_string());
        map.insert("margin".to_string(), self.margin.to_string());
        map.insert("border".to_string(), self.border.to_string());
        map.insert(
            "showText".to_string(),
            if self.show_text { "1" } else { "0" }.to_string(),
        );
        map.insert(
            "errCorrectionLevel".to_string(),
            self.error_correction_level.as_str().to_string(),
        );
        CanonicalConfig(map)
    }
}

/// 渲染配置的规范形式。按键值对集合比较，与序列化时的键顺序无关。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalConfig(BTreeMap<String, String>);

impl CanonicalConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
