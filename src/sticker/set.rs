//! # 贴纸集合模块
//!
//! ## 设计思路
//!
//! `StickerSet` 是切图结果的唯一载体：有序的贴纸列表 + 至多一张主图 + 至多一张标签图。
//! 列表顺序就是导出顺序（决定文件名序号），重排只做位置置换，不改像素。
//!
//! ## 实现思路
//!
//! - 每张贴纸带稳定 `id`（切图时的行优先序号），重排与变换后不变。
//! - 像素放在 `Arc` 中，批处理可廉价拍快照，离锁计算后整体替换。
//! - 每次修改都推进 `revision`（进程级递增），用于识别过期的批处理结果。
//! - 主图/标签图是生成时刻的冻结快照，重排后不会自动重算或失效。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::{GridSpec, StickerError, Tile};

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// 当前集合的输出尺寸标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeLabel {
    /// 切图原生尺寸（正方形边长）。
    Native { side: u32 },
    /// 360×360（Kakao）。
    Kakao360,
    /// 740×640（OGQ）。
    Ogq740x640,
}

impl SizeLabel {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Native { side } => (*side, *side),
            Self::Kakao360 => (360, 360),
            Self::Ogq740x640 => (740, 640),
        }
    }

    /// 导出文件名后缀。
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Native { .. } => "",
            Self::Kakao360 => "_360",
            Self::Ogq740x640 => "_ogq",
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native { .. })
    }
}

impl std::fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{}×{}", w, h)
    }
}

/// 一张贴纸。
#[derive(Debug, Clone)]
pub struct StickerRaster {
    id: u32,
    tile: Tile,
    pixels: Arc<RgbaImage>,
}

impl StickerRaster {
    pub(crate) fn new(id: u32, tile: Tile, pixels: RgbaImage) -> Self {
        Self {
            id,
            tile,
            pixels: Arc::new(pixels),
        }
    }

    /// 保留身份信息，替换像素。
    pub(crate) fn with_pixels(&self, pixels: RgbaImage) -> Self {
        Self::new(self.id, self.tile, pixels)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// 该贴纸在底图中的来源区域。
    pub fn tile(&self) -> Tile {
        self.tile
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// 两张贴纸是否共享同一份像素缓冲（用于确认重排没有复制/重采样）。
    pub fn shares_pixels_with(&self, other: &StickerRaster) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// 派生图类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedKind {
    /// 240×240 主图。
    Main,
    /// 96×74 标签图（中心裁剪到目标比例）。
    Tab,
}

impl DerivedKind {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Main => (240, 240),
            Self::Tab => (96, 74),
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Main => "ogq_main_240x240.png",
            Self::Tab => "ogq_tab_96x74.png",
        }
    }
}

/// 由某张贴纸生成的派生图（冻结快照）。
#[derive(Debug, Clone)]
pub struct DerivedRaster {
    pub kind: DerivedKind,
    /// 生成时所选的位置。
    pub source_index: usize,
    /// 生成时该位置贴纸的 id。
    pub source_id: u32,
    pub pixels: RgbaImage,
}

/// 有序贴纸集合。
#[derive(Debug, Clone)]
pub struct StickerSet {
    rasters: Vec<StickerRaster>,
    label: SizeLabel,
    grid: GridSpec,
    revision: u64,
    main: Option<DerivedRaster>,
    tab: Option<DerivedRaster>,
}

impl StickerSet {
    pub(crate) fn new(rasters: Vec<StickerRaster>, label: SizeLabel, grid: GridSpec) -> Self {
        Self {
            rasters,
            label,
            grid,
            revision: next_revision(),
            main: None,
            tab: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    pub fn rasters(&self) -> &[StickerRaster] {
        &self.rasters
    }

    pub fn get(&self, index: usize) -> Option<&StickerRaster> {
        self.rasters.get(index)
    }

    pub fn label(&self) -> SizeLabel {
        self.label
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn main(&self) -> Option<&DerivedRaster> {
        self.main.as_ref()
    }

    pub fn tab(&self) -> Option<&DerivedRaster> {
        self.tab.as_ref()
    }

    /// 当前顺序下的贴纸 id 列表。
    pub fn ids(&self) -> Vec<u32> {
        self.rasters.iter().map(StickerRaster::id).collect()
    }

    /// 把 `from` 位置的贴纸移动到 `to`，中间的贴纸顺移。
    ///
    /// 纯位置置换：不重采样，也不会重算主图/标签图。
    ///
    /// # 示例
    /// ```rust,ignore
    /// // [A, B, C, D] --move_item(0, 2)--> [B, C, A, D]
    /// set.move_item(0, 2)?;
    /// ```
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), StickerError> {
        self.ensure_not_empty("重排")?;
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let item = self.rasters.remove(from);
        self.rasters.insert(to, item);
        self.revision = next_revision();

        log::debug!("↕️ 贴纸重排：{} -> {}", from, to);
        Ok(())
    }

    /// 交换两个位置的贴纸。
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), StickerError> {
        self.ensure_not_empty("交换")?;
        self.check_index(a)?;
        self.check_index(b)?;
        if a == b {
            return Ok(());
        }

        self.rasters.swap(a, b);
        self.revision = next_revision();
        Ok(())
    }

    pub(crate) fn ensure_not_empty(&self, operation: &str) -> Result<(), StickerError> {
        if self.rasters.is_empty() {
            return Err(StickerError::EmptySet(format!("无法对空集合执行{}", operation)));
        }
        Ok(())
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<&StickerRaster, StickerError> {
        self.rasters.get(index).ok_or(StickerError::IndexOutOfRange {
            index,
            len: self.rasters.len(),
        })
    }

    /// 整体替换贴纸列表与尺寸标签。
    pub(crate) fn replace_rasters(&mut self, rasters: Vec<StickerRaster>, label: SizeLabel) {
        self.rasters = rasters;
        self.label = label;
        self.revision = next_revision();
    }

    pub(crate) fn store_derived(&mut self, derived: DerivedRaster) {
        match derived.kind {
            DerivedKind::Main => self.main = Some(derived),
            DerivedKind::Tab => self.tab = Some(derived),
        }
    }
}
