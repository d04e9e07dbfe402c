//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `SheetInput` 表示上传方给出的底图来源
//! - `RawSheetData` 表示已加载但未解码的字节
//! - `RasterSource` 表示已解码的只读 RGBA 底图
//! - `GridSpec` / `Tile` 描述网格与格子在底图中的矩形区域

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::StickerError;

/// 底图输入来源。
pub enum SheetInput {
    /// `data:image/...;base64,...` 形式的 Data URL。
    DataUrl(String),
    /// 纯 Base64 字符串。
    Base64(String),
    /// 本地文件路径。
    FilePath(PathBuf),
    /// 已在内存中的编码字节（PNG 等）。
    Bytes(Vec<u8>),
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawSheetData {
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 已解码的底图。
///
/// 像素格式固定为 RGBA8，核心流程只读取其子区域，从不修改。
#[derive(Debug, Clone)]
pub struct RasterSource {
    pixels: Arc<RgbaImage>,
}

impl RasterSource {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// 由 RGBA 原始字节构建，长度必须为 `width * height * 4`。
    pub fn from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, StickerError> {
        let len = bytes.len();
        RgbaImage::from_raw(width, height, bytes)
            .map(Self::from_rgba)
            .ok_or_else(|| {
                StickerError::Decode(format!(
                    "RGBA 数据长度 {} 与尺寸 {}x{} 不匹配",
                    len, width, height
                ))
            })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// 是否与另一份底图共享同一块像素（同一次加载）。
    pub fn is_same_sheet(&self, other: &RasterSource) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// 网格行列数。
///
/// 行列均至少为 1；上限由 `SlicerConfig::max_grid_dimension` 约束。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSpec {
    pub cols: u32,
    pub rows: u32,
}

impl GridSpec {
    /// 4 列 × 8 行，32 张一套的标准布局。
    pub const DEFAULT: GridSpec = GridSpec { cols: 4, rows: 8 };
    pub const MAX_DIMENSION: u32 = 20;

    pub fn new(cols: u32, rows: u32) -> Result<Self, StickerError> {
        if cols == 0 || rows == 0 {
            return Err(StickerError::InvalidGrid(format!(
                "行列必须大于 0（cols={}, rows={}）",
                cols, rows
            )));
        }
        Ok(Self { cols, rows })
    }

    pub fn count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

impl std::fmt::Display for GridSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.cols, self.rows)
    }
}

/// 底图中的一个矩形格子区域。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Tile {
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_rejects_zero_dimensions() {
        assert!(matches!(GridSpec::new(0, 3), Err(StickerError::InvalidGrid(_))));
        assert!(matches!(GridSpec::new(3, 0), Err(StickerError::InvalidGrid(_))));
        assert_eq!(GridSpec::new(4, 8).expect("valid grid").count(), 32);
    }

    #[test]
    fn raster_from_raw_checks_length() {
        assert!(RasterSource::from_raw(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            RasterSource::from_raw(2, 2, vec![0; 15]),
            Err(StickerError::Decode(_))
        ));
    }

    #[test]
    fn tile_bounds() {
        let tile = Tile {
            x: 750,
            y: 0,
            width: 250,
            height: 250,
        };
        assert!(tile.fits_within(1000, 250));
        assert!(!tile.fits_within(999, 250));
        assert!(tile.is_square());
    }
}
