use image::RgbImage;
use image::imageops::FilterType;

use crate::error::Result;
use crate::signature::NUM_PIXELS;

const THUMB_SIZE: u32 = NUM_PIXELS as u32;

/// 把图片字节解码为 128×128 真彩缩略图
///
/// 缩放结果必须是确定性的：同一库版本下相同输入字节必须得到相同缩略图，
/// 用不同缩放算法计算的签名互不可比
pub fn thumbnail(data: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(data)?;
    if (img.width(), img.height()) == (THUMB_SIZE, THUMB_SIZE) {
        return Ok(img.to_rgb8());
    }
    Ok(img.resize_exact(THUMB_SIZE, THUMB_SIZE, FilterType::Triangle).to_rgb8())
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgb};
    use rstest::rstest;

    use super::*;

    fn encode_jpeg(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Jpeg).unwrap();
        buf
    }

    // 放大、缩小、等尺寸输入都应得到 128×128 缩略图
    #[rstest]
    #[case(256, 192)]
    #[case(64, 48)]
    #[case(128, 128)]
    fn resizes_to_thumbnail(#[case] width: u32, #[case] height: u32) {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let thumb = thumbnail(&encode_jpeg(&img)).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (THUMB_SIZE, THUMB_SIZE));
    }

    #[test]
    fn deterministic_for_same_bytes() {
        let blob = encode_jpeg(&RgbImage::from_pixel(200, 100, Rgb([3, 141, 59])));
        assert_eq!(thumbnail(&blob).unwrap(), thumbnail(&blob).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(thumbnail(b"definitely not an image").is_err());
    }
}
