use std::collections::{BinaryHeap, HashMap};

use futures::TryStreamExt;
use log::{debug, info, warn};

use crate::bucket::BucketSet;
use crate::db::{Database, ImageRecord, crud};
use crate::error::Result;
use crate::haar::{IMG_BIN, WEIGHTS};
use crate::signature::HaarSignature;
use crate::types::{PostId, Score};

/// 每张在库图片的内存信息
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// avglf 的单精度镜像，供打分内循环使用
    pub avgl: [Score; 3],
    /// 墓碑标记，已删除但尚未回收的条目不会出现在查询结果中
    pub deleted: bool,
}

/// 一条查询结果。分数满分 100，越高越相似
#[derive(Debug, Clone, PartialEq)]
pub struct SimValue {
    pub post_id: PostId,
    pub score: Score,
}

/// 图片签名数据库：倒排索引 + info 表 + SQLite 持久化
///
/// 三者整体由调用方的读写锁保护，查询持读锁，增删持写锁，
/// 因此任何查询都不会观察到加了一半的图片
pub struct IQDB {
    db: Database,
    buckets: BucketSet,
    info: HashMap<PostId, ImageInfo>,
    img_count: u64,
}

impl IQDB {
    /// 打开数据库并把全部签名装载进内存索引
    pub async fn open(db: Database) -> Result<Self> {
        let mut iqdb =
            Self { db, buckets: BucketSet::new(), info: HashMap::new(), img_count: 0 };
        iqdb.load().await?;
        Ok(iqdb)
    }

    /// 重建内存索引：清空后重放持久化存储中的所有记录（顺序不限）
    async fn load(&mut self) -> Result<()> {
        self.buckets = BucketSet::new();
        self.info.clear();
        self.img_count = 0;

        let pool = self.db.clone();
        let mut rows = crud::each_image(&pool);
        while let Some(record) = rows.try_next().await? {
            let haar = record.haar()?;
            self.add_in_memory(record.post_id, &haar);
            if self.img_count % 250_000 == 0 {
                info!("已加载 {} 张图片……", self.img_count);
            }
        }

        info!("数据库装载完成，共 {} 张图片", self.img_count);
        Ok(())
    }

    /// 当前在库（未删除）的图片数量
    pub fn image_count(&self) -> u64 {
        self.img_count
    }

    /// 添加图片。先清除同 ID 的旧签名，保证重复摄入幂等
    pub async fn add_image(&mut self, post_id: &str, md5: &str, haar: &HaarSignature) -> Result<()> {
        self.remove_image(post_id).await?;
        crud::insert_or_replace(&self.db, post_id, md5, haar).await?;
        self.add_in_memory(post_id.to_owned(), haar);

        debug!("已添加图片 [post_id={}, md5={}]", post_id, md5);
        Ok(())
    }

    fn add_in_memory(&mut self, post_id: PostId, haar: &HaarSignature) {
        self.buckets.add(haar, &post_id);
        let avgl = [haar.avglf[0] as Score, haar.avglf[1] as Score, haar.avglf[2] as Score];
        self.info.insert(post_id, ImageInfo { avgl, deleted: false });
        self.img_count += 1;
    }

    /// 删除图片。持久化存储中不存在时仅记录日志（幂等）
    pub async fn remove_image(&mut self, post_id: &str) -> Result<()> {
        let Some(record) = crud::get_image(&self.db, post_id).await? else {
            debug!("忽略删除请求：post {} 不在数据库中", post_id);
            return Ok(());
        };

        let haar = record.haar()?;
        self.buckets.remove(&haar, &record.post_id);
        if let Some(info) = self.info.get_mut(post_id) {
            info.deleted = true;
        }
        crud::delete_image(&self.db, post_id).await?;
        self.img_count -= 1;

        debug!("已删除图片 [post_id={}]", post_id);
        Ok(())
    }

    /// 按 ID 查询持久化记录
    pub async fn get_image(&self, post_id: &str) -> Result<Option<ImageRecord>> {
        Ok(crud::get_image(&self.db, post_id).await?)
    }

    /// 按 MD5 查询持久化记录
    pub async fn get_by_md5(&self, md5: &str) -> Result<Vec<ImageRecord>> {
        Ok(crud::get_by_md5(&self.db, md5).await?)
    }

    /// 从图片字节查询：先走签名管线，再做相似度打分
    pub fn query_from_blob(&self, blob: &[u8], limit: usize) -> Result<Vec<SimValue>> {
        let haar = HaarSignature::from_image_bytes(blob)?;
        Ok(self.query_from_signature(&haar, limit))
    }

    /// 相似度查询：DC 亮度基线 + 桶扫描 + 有界堆取前 N
    ///
    /// 原始分数越小越相似；报告分数按 `raw × 100 × scale` 换算，
    /// 完全一致的签名得 100 分，结果按相似度从高到低排列
    pub fn query_from_signature(&self, sig: &HaarSignature, limit: usize) -> Vec<SimValue> {
        if limit == 0 {
            return Vec::new();
        }

        let mut scale: Score = 0.0;
        let mut scores: HashMap<&str, Score> = HashMap::with_capacity(self.info.len());

        // 亮度基线：对全表（含墓碑项，稍后过滤）按 DC 系数差打底分
        for (id, info) in &self.info {
            let mut s = 0.0;
            for c in 0..3 {
                s += WEIGHTS[0][c] * (info.avgl[c] - sig.avglf[c] as Score).abs();
            }
            scores.insert(id.as_str(), s);
        }

        // 桶扫描：查询签名触及的每个非空桶，按权重削减桶内图片的分数
        for (color, chan) in sig.sig.iter().enumerate() {
            for &coef in chan {
                let bucket = self.buckets.at(color, coef);
                if bucket.is_empty() {
                    continue;
                }

                let weight = WEIGHTS[IMG_BIN[coef.unsigned_abs() as usize] as usize][color];
                scale -= weight;

                for id in bucket {
                    *scores.entry(id.as_str()).or_insert(0.0) -= weight;
                }
            }
        }

        if scale != 0.0 {
            scale = 1.0 / scale;
        }

        // 有界堆：超出容量时淘汰原始分数最大（最不相似）的项
        let mut heap = BinaryHeap::with_capacity(limit + 1);
        for (id, score) in scores {
            match self.info.get(id) {
                Some(info) if !info.deleted => {
                    heap.push(SimCand { score, post_id: id });
                    if heap.len() > limit {
                        heap.pop();
                    }
                }
                Some(_) => {}
                None => warn!("索引中出现 info 表没有的图片 {}，已跳过", id),
            }
        }

        // 原始分数升序（最相似在前），换算为报告分数
        heap.into_sorted_vec()
            .into_iter()
            .map(|cand| SimValue {
                post_id: cand.post_id.to_owned(),
                score: cand.score * 100.0 * scale,
            })
            .collect()
    }
}

/// 堆中的候选项，按 (原始分数, ID) 全序排序，保证截断处的并列可复现
struct SimCand<'a> {
    score: Score,
    post_id: &'a str,
}

impl Ord for SimCand<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score.total_cmp(&other.score).then_with(|| self.post_id.cmp(other.post_id))
    }
}

impl PartialOrd for SimCand<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SimCand<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for SimCand<'_> {}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::db::init_db;
    use crate::signature::{NUM_CHANNELS, NUM_COEFS};

    async fn open_iqdb(dir: &TempDir) -> IQDB {
        let db = init_db(dir.path().join("iqdb.db")).await.unwrap();
        IQDB::open(db).await.unwrap()
    }

    /// 构造互不相同的合成签名
    fn test_sig(seed: i16) -> HaarSignature {
        let mut sig = [[0i16; NUM_COEFS]; NUM_CHANNELS];
        for (c, chan) in sig.iter_mut().enumerate() {
            for (i, coef) in chan.iter_mut().enumerate() {
                let pos = seed * 160 + (c * NUM_COEFS + i) as i16 + 1;
                *coef = if (seed + i as i16) % 2 == 0 { pos } else { -pos };
            }
        }
        HaarSignature { avglf: [0.3 + seed as f64 * 0.1, 0.01 * seed as f64, -0.02], sig }
    }

    #[tokio::test]
    async fn empty_db_returns_nothing() {
        let dir = TempDir::new().unwrap();
        let iqdb = open_iqdb(&dir).await;
        assert_eq!(iqdb.image_count(), 0);
        assert!(iqdb.query_from_signature(&test_sig(0), 10).is_empty());
    }

    #[tokio::test]
    async fn self_query_scores_100() {
        let dir = TempDir::new().unwrap();
        let mut iqdb = open_iqdb(&dir).await;
        for seed in 0..3 {
            let sig = test_sig(seed);
            iqdb.add_image(&format!("post-{seed}"), "d41d8cd9", &sig).await.unwrap();
        }

        for seed in 0..3 {
            let result = iqdb.query_from_signature(&test_sig(seed), 5);
            assert!(!result.is_empty());
            assert_eq!(result[0].post_id, format!("post-{seed}"));
            assert!((result[0].score - 100.0).abs() < 0.01, "score = {}", result[0].score);
        }
    }

    #[tokio::test]
    async fn results_are_sorted_best_first() {
        let dir = TempDir::new().unwrap();
        let mut iqdb = open_iqdb(&dir).await;
        for seed in 0..4 {
            iqdb.add_image(&format!("post-{seed}"), "md5", &test_sig(seed)).await.unwrap();
        }

        let result = iqdb.query_from_signature(&test_sig(1), 10);
        assert_eq!(result.len(), 4);
        for pair in result.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn limit_bounds_result_count() {
        let dir = TempDir::new().unwrap();
        let mut iqdb = open_iqdb(&dir).await;
        for seed in 0..5 {
            iqdb.add_image(&format!("post-{seed}"), "md5", &test_sig(seed)).await.unwrap();
        }

        assert_eq!(iqdb.query_from_signature(&test_sig(0), 2).len(), 2);
        assert!(iqdb.query_from_signature(&test_sig(0), 0).is_empty());
    }

    #[tokio::test]
    async fn removed_image_never_returned() {
        let dir = TempDir::new().unwrap();
        let mut iqdb = open_iqdb(&dir).await;
        let sig = test_sig(0);
        iqdb.add_image("a1", "md5", &sig).await.unwrap();
        iqdb.remove_image("a1").await.unwrap();

        assert_eq!(iqdb.image_count(), 0);
        assert!(iqdb.query_from_signature(&sig, 10).is_empty());
        assert!(iqdb.get_image("a1").await.unwrap().is_none());

        // 重复删除是幂等的
        iqdb.remove_image("a1").await.unwrap();
        assert_eq!(iqdb.image_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_id_replaces_old_signature() {
        let dir = TempDir::new().unwrap();
        let mut iqdb = open_iqdb(&dir).await;
        let (old, new) = (test_sig(0), test_sig(3));
        iqdb.add_image("b", "md5-x", &old).await.unwrap();
        iqdb.add_image("b", "md5-y", &new).await.unwrap();

        assert_eq!(iqdb.image_count(), 1);

        let result = iqdb.query_from_signature(&new, 5);
        assert_eq!(result[0].post_id, "b");
        assert!((result[0].score - 100.0).abs() < 0.01);

        // 旧签名的桶已清空，用旧签名查询不会得到满分
        let result = iqdb.query_from_signature(&old, 5);
        assert!(result.is_empty() || result[0].score < 90.0);
    }

    #[tokio::test]
    async fn md5_lookup_returns_all_matches() {
        let dir = TempDir::new().unwrap();
        let mut iqdb = open_iqdb(&dir).await;
        iqdb.add_image("a", "feedface", &test_sig(0)).await.unwrap();
        iqdb.add_image("b", "feedface", &test_sig(1)).await.unwrap();
        iqdb.add_image("c", "deadbeef", &test_sig(2)).await.unwrap();

        let mut ids: Vec<_> =
            iqdb.get_by_md5("feedface").await.unwrap().into_iter().map(|r| r.post_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, ["a", "b"]);
        assert!(iqdb.get_by_md5("0000").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_rebuilds_identical_state() {
        let dir = TempDir::new().unwrap();
        let mut iqdb = open_iqdb(&dir).await;
        for seed in 0..3 {
            iqdb.add_image(&format!("post-{seed}"), "md5", &test_sig(seed)).await.unwrap();
        }
        let before = iqdb.query_from_signature(&test_sig(1), 10);
        drop(iqdb);

        // 在同一数据库文件上重新装载两次，状态应当一致
        let reloaded = open_iqdb(&dir).await;
        assert_eq!(reloaded.image_count(), 3);
        assert_eq!(reloaded.query_from_signature(&test_sig(1), 10), before);

        let reloaded = open_iqdb(&dir).await;
        assert_eq!(reloaded.query_from_signature(&test_sig(1), 10), before);
    }
}
