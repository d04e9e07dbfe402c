//! # 解码模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGBA”的过程集中管理，并在完整解码前先读取头部尺寸，
//! 按像素上限快速拒绝超大底图，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 读取 header 尺寸
//! 2. 按像素上限快速拒绝
//! 3. 完整解码并转换 RGBA（保留 alpha 通道）
//! 4. 校验字节长度一致性

use image::{GenericImageView, ImageReader};
use std::io::Cursor;
use std::time::Instant;

use super::loader::load_raw;
use super::source::RawSheetData;
use super::{RasterSource, SheetInput, SlicerConfig, StickerError};

/// 加载并解码底图。
///
/// # 示例
/// ```rust,no_run
/// use sticker_slicer::sticker::{decode_sheet, SheetInput, SlicerConfig};
///
/// let sheet = decode_sheet(
///     SheetInput::FilePath("sheet.png".into()),
///     &SlicerConfig::default(),
/// )?;
/// println!("{}x{}", sheet.width(), sheet.height());
/// # Ok::<(), sticker_slicer::sticker::StickerError>(())
/// ```
pub fn decode_sheet(input: SheetInput, config: &SlicerConfig) -> Result<RasterSource, StickerError> {
    let load_start = Instant::now();
    let raw = load_raw(input, config)?;
    let load_elapsed = load_start.elapsed();

    let decode_start = Instant::now();
    let sheet = decode_raw(raw, config)?;

    log::info!(
        "✅ 底图就绪 - load={}ms decode={}ms",
        load_elapsed.as_millis(),
        decode_start.elapsed().as_millis()
    );
    Ok(sheet)
}

pub(crate) fn decode_raw(raw: RawSheetData, config: &SlicerConfig) -> Result<RasterSource, StickerError> {
    let (header_width, header_height) = inspect_dimensions_from_memory(&raw.bytes)?;
    validate_pixel_limits(config, header_width, header_height)?;

    let decoded = image::load_from_memory(&raw.bytes)
        .map_err(|e| StickerError::Decode(format!("图片解码失败：{}", e)))?;

    let (width, height) = decoded.dimensions();
    validate_pixel_limits(config, width, height)?;

    let rgba = decoded.to_rgba8();
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| StickerError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))?;

    if rgba.as_raw().len() != expected_len {
        return Err(StickerError::Decode("解码后像素数据长度异常".to_string()));
    }

    log::info!(
        "✅ 底图解码成功 - 来源: {} 尺寸: {}x{}",
        raw.source_hint,
        width,
        height
    );

    Ok(RasterSource::from_rgba(rgba))
}

/// 仅通过图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), StickerError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StickerError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

    reader
        .into_dimensions()
        .map_err(|e| StickerError::InvalidFormat(format!("无法读取图片尺寸：{}", e)))
}

fn validate_pixel_limits(config: &SlicerConfig, width: u32, height: u32) -> Result<(), StickerError> {
    if width == 0 || height == 0 {
        return Err(StickerError::Decode(format!("底图尺寸无效：{}x{}", width, height)));
    }

    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| StickerError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(StickerError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}
