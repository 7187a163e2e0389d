use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::LazyLock;

use image::RgbImage;

use crate::signature::{HaarSignature, NUM_COEFS, NUM_PIXELS, NUM_PIXELS_SQUARED};

/// (bin, 通道) 加权表，继承自 imgSeek
///
/// 数值属于指纹格式契约的一部分：修改后历史签名将不可比较，必须全量重建索引
#[rustfmt::skip]
pub const WEIGHTS: [[f32; 3]; 6] = [
    //  Y      I      Q
    [ 5.00, 19.21, 34.37 ], // DC
    [ 0.83,  1.26,  0.36 ],
    [ 1.01,  0.44,  0.45 ],
    [ 0.52,  0.53,  0.14 ],
    [ 0.47,  0.28,  0.18 ],
    [ 0.30,  0.14,  0.27 ],
];

/// 系数位置 → 权重 bin（0..=5）的查找表
pub static IMG_BIN: LazyLock<[u8; NUM_PIXELS_SQUARED]> = LazyLock::new(|| {
    let mut bin = [0u8; NUM_PIXELS_SQUARED];
    for i in 0..NUM_PIXELS {
        for j in 0..NUM_PIXELS {
            bin[i * NUM_PIXELS + j] = i.max(j).min(5) as u8;
        }
    }
    bin
});

/// 从 128×128 缩略图计算 Haar 签名
///
/// 三个 YIQ 平面各自做二维 Haar 分解，DC 项换算后存入 avglf，
/// 再从剩余 AC 系数中选出幅值最大的 40 个位置
pub fn calc_haar(img: &RgbImage) -> HaarSignature {
    debug_assert_eq!((img.width(), img.height()), (NUM_PIXELS as u32, NUM_PIXELS as u32));

    let mut planes = rgb_to_yiq(img);
    let mut avglf = [0.0; 3];
    let mut sig = [[0i16; NUM_COEFS]; 3];

    for (c, plane) in planes.iter_mut().enumerate() {
        haar_2d(plane);
        // DC 项补回行列分解中省略的缩放因子
        avglf[c] = plane[0] / (256.0 * 128.0);
        plane[0] = 0.0;
        sig[c] = largest_coefs(plane);
    }

    HaarSignature { avglf, sig }
}

/// 逐像素按 NTSC 矩阵转换到 YIQ 平面
fn rgb_to_yiq(img: &RgbImage) -> [Vec<f64>; 3] {
    let mut y = Vec::with_capacity(NUM_PIXELS_SQUARED);
    let mut i = Vec::with_capacity(NUM_PIXELS_SQUARED);
    let mut q = Vec::with_capacity(NUM_PIXELS_SQUARED);

    for pixel in img.pixels() {
        let [r, g, b] = pixel.0;
        let (r, g, b) = (r as f64, g as f64, b as f64);
        y.push(0.299 * r + 0.587 * g + 0.114 * b);
        i.push(0.596 * r - 0.275 * g - 0.321 * b);
        q.push(0.212 * r - 0.523 * g + 0.311 * b);
    }

    [y, i, q]
}

/// 对一个平面做二维 Haar 分解（先行后列）
///
/// 每层的成对求和不做缩放，差值乘以逐层累积的 0.7071，
/// 循环结束后再修正首元素，结果与逐层正交归一等价且少一半乘法
fn haar_2d(a: &mut [f64]) {
    let mut t = [0.0f64; NUM_PIXELS / 2];

    // 行分解
    for i in (0..NUM_PIXELS_SQUARED).step_by(NUM_PIXELS) {
        let mut c = 1.0;
        let mut h = NUM_PIXELS;
        while h > 1 {
            let h1 = h >> 1;
            c *= 0.7071;
            let (mut j1, mut j2) = (i, i);
            for slot in t.iter_mut().take(h1) {
                *slot = (a[j2] - a[j2 + 1]) * c;
                a[j1] = a[j2] + a[j2 + 1];
                j1 += 1;
                j2 += 2;
            }
            a[i + h1..i + h].copy_from_slice(&t[..h1]);
            h = h1;
        }
        // c = 1/sqrt(128)
        a[i] *= c;
    }

    // 列分解
    for i in 0..NUM_PIXELS {
        let mut c = 1.0;
        let mut h = NUM_PIXELS;
        while h > 1 {
            let h1 = h >> 1;
            c *= 0.7071;
            let (mut j1, mut j2) = (i, i);
            for slot in t.iter_mut().take(h1) {
                *slot = (a[j2] - a[j2 + NUM_PIXELS]) * c;
                a[j1] = a[j2] + a[j2 + NUM_PIXELS];
                j1 += NUM_PIXELS;
                j2 += 2 * NUM_PIXELS;
            }
            let mut j = i + h1 * NUM_PIXELS;
            for &slot in t.iter().take(h1) {
                a[j] = slot;
                j += NUM_PIXELS;
            }
            h = h1;
        }
        a[i] *= c;
    }
}

struct Coef {
    mag: f64,
    pos: usize,
}

// 幅值升序，幅值相同时位置大的在前，这样淘汰堆顶会保留光栅序靠前的位置
impl Ord for Coef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.mag.total_cmp(&other.mag).then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for Coef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Coef {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Coef {}

/// 选出平面中幅值最大的 40 个 AC 系数，返回带符号的位置数组（升序）
///
/// 有界小顶堆：先用位置 1..=40 填满，其后仅当幅值严格更大时替换堆顶，
/// 幅值相同时保留光栅序靠前的位置，保证结果可复现
fn largest_coefs(plane: &[f64]) -> [i16; NUM_COEFS] {
    let mut heap = BinaryHeap::with_capacity(NUM_COEFS + 1);
    for pos in 1..=NUM_COEFS {
        heap.push(Reverse(Coef { mag: plane[pos].abs(), pos }));
    }
    for pos in NUM_COEFS + 1..NUM_PIXELS_SQUARED {
        let mag = plane[pos].abs();
        if mag > heap.peek().expect("heap is never empty").0.mag {
            heap.pop();
            heap.push(Reverse(Coef { mag, pos }));
        }
    }

    let mut sig = [0i16; NUM_COEFS];
    for (slot, Reverse(coef)) in sig.iter_mut().zip(heap.into_iter()) {
        *slot = if plane[coef.pos] <= 0.0 { -(coef.pos as i16) } else { coef.pos as i16 };
    }
    sig.sort_unstable();
    sig
}
