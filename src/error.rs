use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// 错误类型，分为两类：
/// 客户端可恢复的简单错误（参数、图片解码、404），以及服务端致命错误（IO、数据损坏）
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("not found")]
    NotFound,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("data corruption: {0}")]
    DataCorruption(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    pub fn data_corruption(msg: impl Into<String>) -> Self {
        Error::DataCorruption(msg.into())
    }

    /// 错误类别名，用于 HTTP 错误响应中的 `exception` 字段
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidParameter(_) => "InvalidParameter",
            Error::ImageDecode(_) => "ImageDecode",
            Error::NotFound => "NotFound",
            Error::Io(_) => "IoError",
            Error::Sqlx(_) => "IoError",
            Error::DataCorruption(_) => "DataCorruption",
            Error::Internal(_) => "Internal",
        }
    }
}
