//! # 重采样模块
//!
//! 所有缩放/裁剪最终都落到这里：优先使用 `fast_image_resize`（SIMD，
//! 自动处理 alpha 预乘），失败时回退到 `image::imageops`。
//! 缩放一律为“拉伸到目标尺寸”，不保持原始宽高比。

use fast_image_resize as fr;
use image::imageops::{self, FilterType};
use image::RgbaImage;

use super::StickerError;

/// 源图中的裁剪区域，允许小数坐标。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: width as f64,
            height: height as f64,
        }
    }

    fn is_integral(&self) -> bool {
        [self.left, self.top, self.width, self.height]
            .iter()
            .all(|v| v.fract() == 0.0)
    }
}

/// 将整张图拉伸到 `width × height`。
pub fn resize_exact(
    src: &RgbaImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RgbaImage, StickerError> {
    resize_region(src, CropRect::full(src.width(), src.height()), width, height, filter)
}

/// 取 `crop` 区域并拉伸到 `width × height`。
pub fn resize_region(
    src: &RgbaImage,
    crop: CropRect,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RgbaImage, StickerError> {
    if width == 0 || height == 0 {
        return Err(StickerError::ResourceLimit(format!(
            "目标尺寸无效：{}x{}",
            width, height
        )));
    }
    if crop.width <= 0.0
        || crop.height <= 0.0
        || crop.left < 0.0
        || crop.top < 0.0
        || crop.left + crop.width > src.width() as f64
        || crop.top + crop.height > src.height() as f64
    {
        return Err(StickerError::ResourceLimit(format!(
            "裁剪区域越界：{:?}（源图 {}x{}）",
            crop,
            src.width(),
            src.height()
        )));
    }

    // 整数区域且尺寸不变时直接拷贝像素，保证逐位一致
    if crop.is_integral() && crop.width as u32 == width && crop.height as u32 == height {
        return Ok(
            imageops::crop_imm(src, crop.left as u32, crop.top as u32, width, height).to_image(),
        );
    }

    match resize_with_fast_image_resize(src, crop, width, height, filter) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 执行失败，回退 imageops::resize：{}", err);
            Ok(resize_with_imageops(src, crop, width, height, filter))
        }
    }
}

fn resize_with_fast_image_resize(
    src: &RgbaImage,
    crop: CropRect,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RgbaImage, StickerError> {
    let src_image = fr::images::ImageRef::new(
        src.width(),
        src.height(),
        src.as_raw(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| StickerError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)))
        .crop(crop.left, crop.top, crop.width, crop.height);

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| StickerError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    RgbaImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| StickerError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))
}

fn resize_with_imageops(
    src: &RgbaImage,
    crop: CropRect,
    width: u32,
    height: u32,
    filter: FilterType,
) -> RgbaImage {
    let x = crop.left.round() as u32;
    let y = crop.top.round() as u32;
    let w = (crop.width.round() as u32).clamp(1, src.width() - x.min(src.width() - 1));
    let h = (crop.height.round() as u32).clamp(1, src.height() - y.min(src.height() - 1));
    let region = imageops::crop_imm(src, x, y, w, h).to_image();
    imageops::resize(&region, width, height, filter)
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn same_size_integral_crop_is_a_copy() {
        let src = RgbaImage::from_fn(6, 4, |x, y| Rgba([x as u8, y as u8, 7, 200]));
        let crop = CropRect {
            left: 2.0,
            top: 1.0,
            width: 3.0,
            height: 2.0,
        };

        let out = resize_region(&src, crop, 3, 2, FilterType::Triangle).expect("copy");

        assert_eq!(out.dimensions(), (3, 2));
        assert_eq!(out.get_pixel(0, 0), &Rgba([2, 1, 7, 200]));
        assert_eq!(out.get_pixel(2, 1), &Rgba([4, 2, 7, 200]));
    }

    #[test]
    fn resize_exact_ignores_aspect_ratio() {
        let src = RgbaImage::from_pixel(100, 50, Rgba([10, 20, 30, 255]));
        let out = resize_exact(&src, 36, 36, FilterType::Triangle).expect("resize");

        assert_eq!(out.dimensions(), (36, 36));
        let p = out.get_pixel(18, 18).0;
        for (got, want) in p.iter().zip([10u8, 20, 30, 255]) {
            assert!(got.abs_diff(want) <= 1, "{:?}", p);
        }
    }

    #[test]
    fn transparent_pixels_stay_transparent() {
        let src = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 0]));
        let out = resize_exact(&src, 10, 10, FilterType::CatmullRom).expect("resize");

        assert!(out.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn out_of_bounds_crop_is_rejected() {
        let src = RgbaImage::new(10, 10);
        let crop = CropRect {
            left: 5.0,
            top: 0.0,
            width: 6.0,
            height: 10.0,
        };
        assert!(matches!(
            resize_region(&src, crop, 4, 4, FilterType::Nearest),
            Err(StickerError::ResourceLimit(_))
        ));
        assert!(resize_exact(&src, 0, 4, FilterType::Nearest).is_err());
    }
}
