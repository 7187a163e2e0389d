mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::get_image_handler,
        api::add_image_handler,
        api::delete_image_handler,
        api::query_handler,
        api::status_handler,
    ),
    components(schemas(types::AddImageForm, types::QueryForm))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/images/{post_id}",
            get(api::get_image_handler)
                .post(api::add_image_handler)
                .delete(api::delete_image_handler),
        )
        .route("/query", post(api::query_handler))
        .route("/status", get(api::status_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
