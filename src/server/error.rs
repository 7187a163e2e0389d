use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// API 错误包装
///
/// `NotFound` 映射为 404，其余错误统一以 JSON 形式返回 500，
/// 附带错误类别、消息和回溯
pub struct ApiError(pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" }))).into_response()
            }
            err => {
                let backtrace = std::backtrace::Backtrace::force_capture().to_string();
                log::error!("请求处理失败: {} ({})", err, err.name());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "exception": err.name(),
                        "message": err.to_string(),
                        "backtrace": backtrace,
                    })),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
