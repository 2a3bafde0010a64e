use serde::{Deserialize, Serialize};

use super::image_config::ImageConfigInput;

/// 拨号码图片请求体
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
  "dialcode": "K7G9X2",
  "channel": "orgA",
  "publisher": "pub1",
  "config": {"color": "#000", "width": 30, "height": 30, "showText": "true"},
  "deleteLocalFile": true
}))]
pub struct GetImageRequest {
    /// 拨号码
    #[schema(example = "K7G9X2")]
    pub dialcode: String,
    /// 渠道（作用域命名空间）
    #[schema(example = "orgA")]
    pub channel: String,
    /// 发布方（作用域所有者）
    #[schema(example = "pub1")]
    pub publisher: String,
    /// 渲染配置（可选，缺省字段使用默认值）
    #[serde(default)]
    pub config: Option<ImageConfigInput>,
    /// 生成完成后是否删除本地临时文件（默认 true）
    #[serde(default)]
    pub delete_local_file: Option<bool>,
}

/// 拨号码图片响应
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetImageResponse {
    /// 图片公开访问地址
    #[schema(example = "http://localhost:3939/images/orgA/pub1/K7G9X2_1735900000000.png")]
    pub url: String,
    /// 本次请求是否新生成了图片（false 表示命中已有图片）
    pub created: bool,
}
