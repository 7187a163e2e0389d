use crate::signature::{HaarSignature, NUM_CHANNELS, NUM_PIXELS_SQUARED};
use crate::types::PostId;

/// 共享同一个带符号系数位置的图片列表
pub type Bucket = Vec<PostId>;

const NUM_SIGNS: usize = 2;

/// 倒排索引：(通道, 符号, |位置|) → 包含该系数的图片列表
///
/// 固定形状 3 × 2 × 16384，绝大多数桶为空。桶内是无序多重集合，
/// 尾部追加，删除为 O(桶长)。本身不做同步，由外层读写锁保护。
pub struct BucketSet {
    buckets: Vec<Bucket>,
}

impl BucketSet {
    pub fn new() -> Self {
        Self { buckets: vec![Vec::new(); NUM_CHANNELS * NUM_SIGNS * NUM_PIXELS_SQUARED] }
    }

    /// 将 id 追加到签名涉及的全部 3×40 个桶
    ///
    /// 不保证幂等：重复 add 会插入重复项并破坏打分，调用方必须先 remove
    pub fn add(&mut self, sig: &HaarSignature, id: &PostId) {
        self.each_bucket(sig, |bucket| bucket.push(id.clone()));
    }

    /// 从签名涉及的桶中清除 id 的所有出现
    pub fn remove(&mut self, sig: &HaarSignature, id: &PostId) {
        self.each_bucket(sig, |bucket| bucket.retain(|other| other != id));
    }

    /// 打分内循环使用的直接访问器
    pub fn at(&self, color: usize, coef: i16) -> &Bucket {
        &self.buckets[Self::index(color, coef)]
    }

    fn each_bucket(&mut self, sig: &HaarSignature, mut f: impl FnMut(&mut Bucket)) {
        for (color, chan) in sig.sig.iter().enumerate() {
            for &coef in chan {
                f(&mut self.buckets[Self::index(color, coef)]);
            }
        }
    }

    fn index(color: usize, coef: i16) -> usize {
        let sign = (coef < 0) as usize;
        (color * NUM_SIGNS + sign) * NUM_PIXELS_SQUARED + coef.unsigned_abs() as usize
    }
}

impl Default for BucketSet {
    fn default() -> Self {
        Self::new()
    }
}
