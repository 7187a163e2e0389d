use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::{haar, resizer};

/// 缩略图边长
pub const NUM_PIXELS: usize = 128;
/// 每个颜色平面的系数总数
pub const NUM_PIXELS_SQUARED: usize = NUM_PIXELS * NUM_PIXELS;
/// 每个颜色平面保留的 AC 系数数量
pub const NUM_COEFS: usize = 40;
/// 颜色平面数量（Y、I、Q）
pub const NUM_CHANNELS: usize = 3;
/// 持久化的系数 blob 大小：3 × 40 个小端 i16
pub const SIG_BLOB_SIZE: usize = NUM_CHANNELS * NUM_COEFS * 2;

const HASH_PREFIX: &str = "iqdb_";
const HASH_LEN: usize = NUM_CHANNELS * 16 + SIG_BLOB_SIZE * 2;

/// 一张图片的 Haar 小波指纹
///
/// `sig` 中的每个值是带符号的线性化系数位置：符号来自小波系数的正负，
/// 绝对值是系数在 128×128 平面中的位置（1..16383，位置 0 的 DC 项单独存放在 `avglf`）。
/// 系数幅值本身不保留。
#[derive(Debug, Clone, PartialEq)]
pub struct HaarSignature {
    /// Y、I、Q 三个平面的 DC 系数
    pub avglf: [f64; NUM_CHANNELS],
    /// 每个平面幅值最大的 40 个 AC 系数位置
    pub sig: [[i16; NUM_COEFS]; NUM_CHANNELS],
}

impl HaarSignature {
    /// 从原始图片字节计算签名：缩略图 → YIQ → Haar 分解 → 选取最强系数
    pub fn from_image_bytes(data: &[u8]) -> Result<Self> {
        let thumb = resizer::thumbnail(data)?;
        Ok(haar::calc_haar(&thumb))
    }

    /// 从持久化形式还原签名
    pub fn from_blob(avglf: [f64; NUM_CHANNELS], blob: &[u8]) -> Result<Self> {
        if blob.len() != SIG_BLOB_SIZE {
            return Err(Error::data_corruption(format!(
                "signature blob is {} bytes, expected {}",
                blob.len(),
                SIG_BLOB_SIZE
            )));
        }

        let mut sig = [[0i16; NUM_COEFS]; NUM_CHANNELS];
        for (i, chunk) in blob.chunks_exact(2).enumerate() {
            let coef = i16::from_le_bytes([chunk[0], chunk[1]]);
            if !valid_coef(coef) {
                return Err(Error::data_corruption(format!(
                    "coefficient {coef} out of range in signature blob"
                )));
            }
            sig[i / NUM_COEFS][i % NUM_COEFS] = coef;
        }

        Ok(Self { avglf, sig })
    }

    /// 系数矩阵的持久化形式：240 字节的小端 i16 数组
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(SIG_BLOB_SIZE);
        for chan in &self.sig {
            for coef in chan {
                blob.extend_from_slice(&coef.to_le_bytes());
            }
        }
        blob
    }
}

/// 合法的系数位置在 [1, 16383] 内，位置 0 属于 DC 项
fn valid_coef(coef: i16) -> bool {
    let pos = coef.unsigned_abs() as usize;
    pos >= 1 && pos < NUM_PIXELS_SQUARED
}

/// 规范哈希串：`iqdb_` 前缀 + 三个 DC 系数的 f64 位型 + 各系数的 u16 位型，均为十六进制
impl fmt::Display for HaarSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HASH_PREFIX)?;
        for avg in self.avglf {
            write!(f, "{:016x}", avg.to_bits())?;
        }
        for chan in &self.sig {
            for &coef in chan {
                write!(f, "{:04x}", coef as u16)?;
            }
        }
        Ok(())
    }
}

impl FromStr for HaarSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.strip_prefix(HASH_PREFIX).unwrap_or(s);
        if !hex.is_ascii() {
            return Err(Error::invalid_parameter("signature hash is not valid hex"));
        }
        if hex.len() != HASH_LEN {
            return Err(Error::invalid_parameter(format!(
                "signature hash is {} chars, expected {}",
                hex.len(),
                HASH_LEN
            )));
        }

        let mut avglf = [0.0; NUM_CHANNELS];
        for (c, avg) in avglf.iter_mut().enumerate() {
            let bits = u64::from_str_radix(&hex[c * 16..(c + 1) * 16], 16)
                .map_err(|_| Error::invalid_parameter("signature hash is not valid hex"))?;
            *avg = f64::from_bits(bits);
        }

        let mut sig = [[0i16; NUM_COEFS]; NUM_CHANNELS];
        let coefs = &hex[NUM_CHANNELS * 16..];
        for c in 0..NUM_CHANNELS {
            for i in 0..NUM_COEFS {
                let off = (c * NUM_COEFS + i) * 4;
                let bits = u16::from_str_radix(&coefs[off..off + 4], 16)
                    .map_err(|_| Error::invalid_parameter("signature hash is not valid hex"))?;
                let coef = bits as i16;
                if !valid_coef(coef) {
                    return Err(Error::invalid_parameter(format!(
                        "coefficient {coef} out of range"
                    )));
                }
                sig[c][i] = coef;
            }
        }

        Ok(Self { avglf, sig })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 与历史实现兼容的已知签名及其哈希串
    fn known_signature() -> HaarSignature {
        #[rustfmt::skip]
        let sig = [
            [-1933, -1920, -1152, -1029, -1026, -782, -773, -768, -522, -387, -384, -258, -140, -133, -131, -128, -28, -26, -14, -13, -7, -3, 1, 2, 5, 10, 12, 130, 138, 141, 256, 259, 386, 512, 770, 1024, 1027, 1280, 1925, 2560],
            [-4864, -2562, -1557, -1550, -1543, -1541, -1536, -1027, -1024, -919, -896, -645, -640, -512, -261, -258, -257, -133, 128, 131, 134, 141, 256, 259, 384, 646, 901, 908, 1026, 1029, 1286, 1290, 1538, 2560, 2563, 2694, 4869, 4876, 5120, 5123],
            [-5120, -2694, -2563, -2560, -1290, -1286, -1027, -1024, -921, -918, -908, -901, -898, -646, -642, -407, -259, -256, -25, -12, -5, -2, 3, 13, 128, 133, 140, 258, 389, 396, 406, 640, 643, 896, 899, 919, 922, 2562, 2566, 2699],
        ];
        HaarSignature {
            avglf: [0.76577718136597, -0.00011652168713282838, 0.004947875142783265],
            sig,
        }
    }

    const KNOWN_HASH: &str = "iqdb_3fe8813f25bfad46bf1e8ba3578fff323f7444391ec46274f873f880fb80fbfbfbfefcf2fcfbfd00fdf6fe7dfe80fefeff74ff7bff7dff80ffe4ffe6fff2fff3fff9fffd000100020005000a000c0082008a008d0100010301820200030204000403050007850a00ed00f5fef9ebf9f2f9f9f9fbfa00fbfdfc00fc69fc80fd7bfd80fe00fefbfefefeffff7b008000830086008d01000103018002860385038c040204050506050a06020a000a030a861305130c14001403ec00f57af5fdf600faf6fafafbfdfc00fc67fc6afc74fc7bfc7efd7afd7efe69fefdff00ffe7fff4fffbfffe0003000d00800085008c01020185018c019602800283038003830397039a0a020a060a8b";

    #[test]
    fn hash_matches_known_value() {
        assert_eq!(known_signature().to_string(), KNOWN_HASH);
    }

    #[test]
    fn hash_round_trip() {
        let sig = known_signature();
        let parsed: HaarSignature = sig.to_string().parse().unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn blob_round_trip() {
        let sig = known_signature();
        let blob = sig.to_blob();
        assert_eq!(blob.len(), SIG_BLOB_SIZE);
        let parsed = HaarSignature::from_blob(sig.avglf, &blob).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn rejects_malformed_hash() {
        assert!("iqdb_zzzz".parse::<HaarSignature>().is_err());
        assert!("".parse::<HaarSignature>().is_err());
        // 长度正确但包含越界系数（位置 0 是 DC 项，不允许出现）
        let mut sig = known_signature();
        sig.sig[0][0] = 0;
        assert!(sig.to_string().parse::<HaarSignature>().is_err());
    }

    #[test]
    fn rejects_short_blob() {
        assert!(HaarSignature::from_blob([0.0; 3], &[0u8; 10]).is_err());
    }
}
