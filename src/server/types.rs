use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// 摄入请求参数
#[derive(TryFromMultipart)]
pub struct AddImageRequest {
    pub file: Option<Bytes>,
}

/// 查询请求参数
#[derive(TryFromMultipart)]
pub struct QueryRequest {
    pub file: Option<Bytes>,
    pub hash: Option<String>,
    pub limit: Option<usize>,
}

/// 查询 URL 参数，与同名 multipart 字段等价，后者优先
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct QueryParams {
    pub hash: Option<String>,
    pub limit: Option<usize>,
}

/// 摄入表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct AddImageForm {
    /// 上传的图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
}

/// 查询表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct QueryForm {
    /// 上传的图片文件，与 hash 二选一
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: Option<String>,
    /// 签名哈希串，与 file 二选一
    pub hash: Option<String>,
    /// 返回的结果数量
    pub limit: Option<usize>,
}
