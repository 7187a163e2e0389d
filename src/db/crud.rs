use futures::stream::BoxStream;
use sqlx::Result;

use super::{Database, ImageRecord};
use crate::signature::HaarSignature;

/// 按 ID 查询图片记录
pub async fn get_image(db: &Database, post_id: &str) -> Result<Option<ImageRecord>> {
    sqlx::query_as("SELECT post_id, md5, avglf1, avglf2, avglf3, sig FROM images WHERE post_id = ?")
        .bind(post_id)
        .fetch_optional(db)
        .await
}

/// 按 MD5 查询图片记录，可能命中多张
pub async fn get_by_md5(db: &Database, md5: &str) -> Result<Vec<ImageRecord>> {
    sqlx::query_as("SELECT post_id, md5, avglf1, avglf2, avglf3, sig FROM images WHERE md5 = ?")
        .bind(md5)
        .fetch_all(db)
        .await
}

/// 插入或替换图片签名
pub async fn insert_or_replace(
    db: &Database,
    post_id: &str,
    md5: &str,
    haar: &HaarSignature,
) -> Result<()> {
    sqlx::query(
        "REPLACE INTO images (post_id, md5, avglf1, avglf2, avglf3, sig) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(post_id)
    .bind(md5)
    .bind(haar.avglf[0])
    .bind(haar.avglf[1])
    .bind(haar.avglf[2])
    .bind(haar.to_blob())
    .execute(db)
    .await?;

    Ok(())
}

/// 按 ID 删除图片记录
pub async fn delete_image(db: &Database, post_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM images WHERE post_id = ?").bind(post_id).execute(db).await?;
    Ok(())
}

/// 流式遍历全表，启动时重建内存索引用
pub fn each_image(db: &Database) -> BoxStream<'_, Result<ImageRecord>> {
    sqlx::query_as("SELECT post_id, md5, avglf1, avglf2, avglf3, sig FROM images").fetch(db)
}
