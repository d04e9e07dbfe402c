//! # 切图模块
//!
//! ## 设计思路
//!
//! 按网格把底图切成 `cols * rows` 张贴纸，顺序为行优先（第 0 行从左到右，再第 1 行……）。
//! 单格尺寸取整：`floor(W / cols)` × `floor(H / rows)`，右侧/底部余下的像素直接丢弃。
//!
//! 非正方形的格子会被拉伸成边长 `min(tileW, tileH)` 的正方形，不做留白。
//! 若底图是已登记的 740×640 预排底图，则每格直接输出 740×640，
//! 集合的尺寸标签直接记为 OGQ，省去正方形中间态与后续转换。

use std::time::Instant;

use super::batch::parallel_map;
use super::resample::{resize_region, CropRect};
use super::{GridSpec, RasterSource, SizeLabel, SlicerConfig, StickerError, StickerRaster, StickerSet, Tile};

/// 计算行优先的格子区域列表。
pub fn tile_rects(width: u32, height: u32, grid: GridSpec) -> Result<Vec<Tile>, StickerError> {
    let grid = GridSpec::new(grid.cols, grid.rows)?;
    let tile_width = width / grid.cols;
    let tile_height = height / grid.rows;

    if tile_width == 0 || tile_height == 0 {
        return Err(StickerError::InvalidGrid(format!(
            "底图 {}x{} 无法切成 {} 网格",
            width, height, grid
        )));
    }

    let mut tiles = Vec::with_capacity(grid.count());
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            tiles.push(Tile {
                x: col * tile_width,
                y: row * tile_height,
                width: tile_width,
                height: tile_height,
            });
        }
    }
    Ok(tiles)
}

/// 切图：生成一个全新的贴纸集合。
///
/// # 示例
/// ```rust,no_run
/// use sticker_slicer::sticker::{detect_grid, tile_sheet, decode_sheet, SheetInput, SlicerConfig};
///
/// let config = SlicerConfig::default();
/// let sheet = decode_sheet(SheetInput::FilePath("sheet.png".into()), &config)?;
/// let grid = detect_grid(&sheet, &config).grid;
/// let set = tile_sheet(&sheet, grid, &config)?;
/// assert_eq!(set.len(), grid.count());
/// # Ok::<(), sticker_slicer::sticker::StickerError>(())
/// ```
pub fn tile_sheet(
    sheet: &RasterSource,
    grid: GridSpec,
    config: &SlicerConfig,
) -> Result<StickerSet, StickerError> {
    let start = Instant::now();
    let grid = config.check_grid(grid)?;
    let (width, height) = sheet.dimensions();
    let tiles = tile_rects(width, height, grid)?;

    let (out_width, out_height, label) = if config.is_preshaped(width, height) {
        let (w, h) = SizeLabel::Ogq740x640.dimensions();
        (w, h, SizeLabel::Ogq740x640)
    } else {
        let side = tiles[0].width.min(tiles[0].height);
        (side, side, SizeLabel::Native { side })
    };

    let filter = config.quality.filter();
    let indexed: Vec<(u32, Tile)> = tiles.into_iter().enumerate().map(|(i, t)| (i as u32, t)).collect();

    let rasters = parallel_map(&indexed, config.workers, |(id, tile)| {
        let crop = CropRect {
            left: tile.x as f64,
            top: tile.y as f64,
            width: tile.width as f64,
            height: tile.height as f64,
        };
        let pixels = resize_region(sheet.pixels(), crop, out_width, out_height, filter)?;
        Ok(StickerRaster::new(*id, *tile, pixels))
    })?;

    log::info!(
        "✂️ 切图完成 - 底图: {}x{} 网格: {} 输出: {} 张 {} 耗时: {}ms",
        width,
        height,
        grid,
        rasters.len(),
        label,
        start.elapsed().as_millis()
    );

    Ok(StickerSet::new(rasters, label, grid))
}
