use sqlx::FromRow;

use crate::error::Result;
use crate::signature::HaarSignature;

/// images 表中的一行
#[derive(Debug, Clone, FromRow)]
pub struct ImageRecord {
    /// 外部图片 ID
    pub post_id: String,
    /// 原始文件的 MD5
    pub md5: String,
    pub avglf1: f64,
    pub avglf2: f64,
    pub avglf3: f64,
    /// 3×40 个小端 i16 系数，正好 240 字节
    pub sig: Vec<u8>,
}

impl ImageRecord {
    /// 还原该行对应的 Haar 签名，blob 损坏时报数据错误
    pub fn haar(&self) -> Result<HaarSignature> {
        HaarSignature::from_blob([self.avglf1, self.avglf2, self.avglf3], &self.sig)
    }
}
