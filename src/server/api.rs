use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum_typed_multipart::TypedMultipart;
use log::{info, warn};
use md5::{Digest, Md5};
use serde_json::{Value, json};
use tokio::task::block_in_place;

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::error::Error;
use crate::metrics;
use crate::signature::HaarSignature;

const DEFAULT_LIMIT: usize = 10;

/// 查询一张图片的签名信息
#[utoipa::path(
    get,
    path = "/images/{post_id}",
    params(("post_id" = String, Path, description = "外部图片 ID")),
    responses(
        (status = 200, description = "图片签名信息"),
        (status = 404, description = "图片不存在"),
    )
)]
pub async fn get_image_handler(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> Result<Json<Value>> {
    let iqdb = state.iqdb.read().await;
    let record = iqdb.get_image(&post_id).await?.ok_or(Error::NotFound)?;
    let haar = record.haar()?;

    Ok(Json(json!({
        "post_id": record.post_id,
        "hash": haar.to_string(),
        "avglf": haar.avglf,
    })))
}

/// 添加一张图片并计算签名
#[utoipa::path(
    post,
    path = "/images/{post_id}",
    params(("post_id" = String, Path, description = "外部图片 ID")),
    request_body(content = AddImageForm, content_type = "multipart/form-data")
)]
pub async fn add_image_handler(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    data: TypedMultipart<AddImageRequest>,
) -> Result<Json<Value>> {
    let file = data
        .file
        .as_ref()
        .ok_or_else(|| Error::invalid_parameter("`POST /images/:id` requires a `file` param"))?;

    info!("正在添加图片 [post_id={}，{} 字节]", post_id, file.len());

    let (md5, haar) = block_in_place(|| -> crate::Result<_> {
        let haar = HaarSignature::from_image_bytes(file)?;
        let md5 = hex::encode(Md5::digest(file));
        Ok((md5, haar))
    })?;

    let mut iqdb = state.iqdb.write().await;
    iqdb.add_image(&post_id, &md5, &haar).await?;

    let sig: Vec<&[i16]> = haar.sig.iter().map(|chan| chan.as_slice()).collect();
    Ok(Json(json!({
        "post_id": post_id,
        "hash": haar.to_string(),
        "signature": {
            "avglf": haar.avglf,
            "sig": sig,
        },
    })))
}

/// 删除一张图片
#[utoipa::path(
    delete,
    path = "/images/{post_id}",
    params(("post_id" = String, Path, description = "外部图片 ID"))
)]
pub async fn delete_image_handler(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> Result<Json<Value>> {
    info!("正在删除图片 [post_id={}]", post_id);

    let mut iqdb = state.iqdb.write().await;
    iqdb.remove_image(&post_id).await?;

    Ok(Json(json!({ "post_id": post_id })))
}

/// 相似图片查询，接受上传文件或签名哈希串
#[utoipa::path(
    post,
    path = "/query",
    params(QueryParams),
    request_body(content = QueryForm, content_type = "multipart/form-data")
)]
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
    data: TypedMultipart<QueryRequest>,
) -> Result<Json<Value>> {
    let limit = data.limit.or(params.limit).unwrap_or(DEFAULT_LIMIT);
    let start = Instant::now();

    let iqdb = state.iqdb.read().await;
    let matches = if let Some(hash) = data.hash.as_deref().or(params.hash.as_deref()) {
        let haar: HaarSignature = hash.parse()?;
        iqdb.query_from_signature(&haar, limit)
    } else if let Some(file) = &data.file {
        info!("正在查询上传图片（{} 字节）", file.len());
        block_in_place(|| iqdb.query_from_blob(file, limit))?
    } else {
        return Err(Error::invalid_parameter("`POST /query` requires a `file` or `hash` param").into());
    };

    metrics::observe_query_duration(start.elapsed().as_secs_f64());
    if let Some(best) = matches.first() {
        metrics::observe_query_max_score(best.score as f64);
    }

    // 逐条回查持久化存储补充哈希与 DC 系数，查不到的记录跳过
    let mut results = Vec::with_capacity(matches.len());
    for m in &matches {
        let Some(record) = iqdb.get_image(&m.post_id).await? else {
            warn!("查询结果中的图片 {} 不在数据库中", m.post_id);
            continue;
        };
        let haar = record.haar()?;
        results.push(json!({
            "post_id": m.post_id,
            "score": m.score,
            "hash": haar.to_string(),
            "signature": { "avglf": haar.avglf },
        }));
    }

    Ok(Json(Value::Array(results)))
}

/// 服务状态：在库图片数量与版本号
#[utoipa::path(get, path = "/status")]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let count = state.iqdb.read().await.image_count();
    Ok(Json(json!({ "images": count, "version": env!("CARGO_PKG_VERSION") })))
}

/// 导出 prometheus 指标
pub async fn metrics_handler() -> String {
    metrics::gather()
}
