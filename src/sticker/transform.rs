//! # 尺寸变换模块
//!
//! ## 设计思路
//!
//! 四个固定操作：
//! - 整套缩放到 360×360（Kakao）
//! - 整套缩放到 740×640（OGQ），已是 740×640 时直接报告成功
//! - 选一张生成 240×240 主图
//! - 选一张中心裁剪到 96:74 后生成 96×74 标签图
//!
//! 整套缩放只允许从原生正方形尺寸出发，防止在已缩小的图上反复有损缩放。
//!
//! ## 实现思路
//!
//! 整套缩放拆成三步：`begin_publish` 拍快照 → `PublishBatch::run` 并行重采样 →
//! `commit_publish` 整体替换。提交时校验 `revision`，
//! 期间集合若被重排或替换，这批结果直接作废。

use std::time::Instant;

use super::batch::parallel_map;
use super::resample::{resize_exact, resize_region, CropRect};
use super::set::{DerivedKind, DerivedRaster};
use super::{SizeLabel, SlicerConfig, StickerError, StickerRaster, StickerSet};

/// 整套发布尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishTarget {
    Kakao360,
    Ogq740x640,
}

impl PublishTarget {
    pub fn label(self) -> SizeLabel {
        match self {
            Self::Kakao360 => SizeLabel::Kakao360,
            Self::Ogq740x640 => SizeLabel::Ogq740x640,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    Applied { count: usize },
    /// 集合已是目标尺寸，未重新计算。
    AlreadyApplied,
}

/// 整套缩放的输入快照。
#[derive(Debug)]
pub struct PublishBatch {
    target: PublishTarget,
    revision: u64,
    rasters: Vec<StickerRaster>,
}

/// 整套缩放的计算结果，尚未提交。
#[derive(Debug)]
pub struct ResizedBatch {
    target: PublishTarget,
    revision: u64,
    rasters: Vec<StickerRaster>,
}

impl PublishBatch {
    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    /// 并行重采样全部贴纸。任一失败则整批失败。
    pub fn run(self, config: &SlicerConfig) -> Result<ResizedBatch, StickerError> {
        let start = Instant::now();
        let (width, height) = self.target.label().dimensions();
        let filter = config.quality.filter();

        let rasters = parallel_map(&self.rasters, config.workers, |raster| {
            resize_exact(raster.pixels(), width, height, filter).map(|px| raster.with_pixels(px))
        })?;

        log::info!(
            "🧩 整套缩放完成 - {} 张 -> {}x{}（filter={:?}）耗时: {}ms",
            rasters.len(),
            width,
            height,
            filter,
            start.elapsed().as_millis()
        );

        Ok(ResizedBatch {
            target: self.target,
            revision: self.revision,
            rasters,
        })
    }
}

impl StickerSet {
    /// 检查前置条件并拍快照；集合已是目标尺寸时返回 `None`。
    pub fn begin_publish(&self, target: PublishTarget) -> Result<Option<PublishBatch>, StickerError> {
        self.ensure_not_empty("尺寸变换")?;

        match (self.label(), target) {
            (SizeLabel::Native { .. }, _) => Ok(Some(PublishBatch {
                target,
                revision: self.revision(),
                rasters: self.rasters().to_vec(),
            })),
            (SizeLabel::Ogq740x640, PublishTarget::Ogq740x640) => Ok(None),
            (current, _) => Err(StickerError::UnsupportedTransform(format!(
                "当前尺寸 {} 不能转换为 {}，请先重新切图",
                current,
                target.label()
            ))),
        }
    }

    /// 提交缩放结果，整体替换贴纸列表。
    pub fn commit_publish(&mut self, batch: ResizedBatch) -> Result<TransformOutcome, StickerError> {
        if batch.revision != self.revision() {
            log::warn!(
                "⚠️ 缩放结果已过期（快照 revision={}，当前 revision={}），丢弃",
                batch.revision,
                self.revision()
            );
            return Err(StickerError::State(
                "缩放期间贴纸集合已变更，结果已作废".to_string(),
            ));
        }

        let count = batch.rasters.len();
        self.replace_rasters(batch.rasters, batch.target.label());
        Ok(TransformOutcome::Applied { count })
    }

    /// 同步执行整套缩放：快照 → 并行计算 → 提交。
    pub fn to_publish_size(
        &mut self,
        target: PublishTarget,
        config: &SlicerConfig,
    ) -> Result<TransformOutcome, StickerError> {
        match self.begin_publish(target)? {
            Some(batch) => {
                let resized = batch.run(config)?;
                self.commit_publish(resized)
            }
            None => {
                log::info!("ℹ️ 已是 {}，跳过转换", target.label());
                Ok(TransformOutcome::AlreadyApplied)
            }
        }
    }

    /// 整套缩放到 360×360。
    pub fn to_kakao_size(&mut self, config: &SlicerConfig) -> Result<TransformOutcome, StickerError> {
        self.to_publish_size(PublishTarget::Kakao360, config)
    }

    /// 整套缩放到 740×640。
    pub fn to_ogq_size(&mut self, config: &SlicerConfig) -> Result<TransformOutcome, StickerError> {
        self.to_publish_size(PublishTarget::Ogq740x640, config)
    }

    /// 选一张贴纸生成 240×240 主图，覆盖已有主图。
    pub fn derive_main(
        &mut self,
        index: usize,
        config: &SlicerConfig,
    ) -> Result<&DerivedRaster, StickerError> {
        self.derive(DerivedKind::Main, index, config)
    }

    /// 选一张贴纸生成 96×74 标签图，覆盖已有标签图。
    pub fn derive_tab(
        &mut self,
        index: usize,
        config: &SlicerConfig,
    ) -> Result<&DerivedRaster, StickerError> {
        self.derive(DerivedKind::Tab, index, config)
    }

    fn derive(
        &mut self,
        kind: DerivedKind,
        index: usize,
        config: &SlicerConfig,
    ) -> Result<&DerivedRaster, StickerError> {
        self.ensure_not_empty("派生图生成")?;
        let source = self.check_index(index)?;
        let (width, height) = kind.dimensions();
        let filter = config.quality.filter();

        let pixels = match kind {
            DerivedKind::Main => resize_exact(source.pixels(), width, height, filter)?,
            DerivedKind::Tab => {
                let crop = center_crop_rect(source.width(), source.height(), width, height);
                resize_region(source.pixels(), crop, width, height, filter)?
            }
        };

        let derived = DerivedRaster {
            kind,
            source_index: index,
            source_id: source.id(),
            pixels,
        };
        log::info!(
            "🖼️ 已生成 {:?} 派生图 - 来源位置: {} id: {}",
            kind,
            index,
            derived.source_id
        );

        self.store_derived(derived);
        let stored = match kind {
            DerivedKind::Main => self.main(),
            DerivedKind::Tab => self.tab(),
        };
        stored.ok_or_else(|| StickerError::State("派生图保存失败".to_string()))
    }
}

/// 中心裁剪到目标宽高比。
///
/// 源图比目标更宽时裁左右，否则裁上下；返回的区域在源图内居中。
pub fn center_crop_rect(source_width: u32, source_height: u32, target_width: u32, target_height: u32) -> CropRect {
    let sw = source_width as f64;
    let sh = source_height as f64;
    let source_aspect = sw / sh;
    let target_aspect = target_width as f64 / target_height as f64;

    if source_aspect > target_aspect {
        let width = sh * target_aspect;
        CropRect {
            left: (sw - width) / 2.0,
            top: 0.0,
            width,
            height: sh,
        }
    } else {
        let height = sw / target_aspect;
        CropRect {
            left: 0.0,
            top: (sh - height) / 2.0,
            width: sw,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sticker::{tile_sheet, GridSpec, RasterSource};
    use image::{Rgba, RgbaImage};

    /// 80×40 底图，4×2 网格，每格 20×20；左上角 5×5 全透明。
    fn native_set() -> StickerSet {
        let sheet = RasterSource::from_rgba(RgbaImage::from_fn(80, 40, |x, y| {
            if x % 20 < 5 && y % 20 < 5 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([(x / 20) as u8 * 40, (y / 20) as u8 * 40, 200, 255])
            }
        }));
        tile_sheet(&sheet, GridSpec { cols: 4, rows: 2 }, &SlicerConfig::default())
            .expect("tiling should succeed")
    }

    #[test]
    fn kakao_resize_keeps_order_and_alpha() {
        let config = SlicerConfig::default();
        let mut set = native_set();
        let ids = set.ids();

        let outcome = set.to_kakao_size(&config).expect("resize");

        assert_eq!(outcome, TransformOutcome::Applied { count: 8 });
        assert_eq!(set.label(), SizeLabel::Kakao360);
        assert_eq!(set.ids(), ids);
        for raster in set.rasters() {
            assert_eq!((raster.width(), raster.height()), (360, 360));
            assert_eq!(raster.pixels().get_pixel(0, 0).0[3], 0);
            assert!(raster.pixels().get_pixel(359, 359).0[3] >= 254);
        }
    }

    #[test]
    fn ogq_resize_then_repeat_is_reported_as_already_applied() {
        let config = SlicerConfig::default();
        let mut set = native_set();

        assert_eq!(
            set.to_ogq_size(&config).expect("convert"),
            TransformOutcome::Applied { count: 8 }
        );
        let revision = set.revision();

        assert_eq!(
            set.to_ogq_size(&config).expect("repeat"),
            TransformOutcome::AlreadyApplied
        );
        assert_eq!(set.revision(), revision);
        assert!(set.rasters().iter().all(|r| (r.width(), r.height()) == (740, 640)));
    }

    #[test]
    fn publish_requires_native_size() {
        let config = SlicerConfig::default();
        let mut set = native_set();
        set.to_kakao_size(&config).expect("resize");

        let to_ogq = set.to_ogq_size(&config).expect_err("360 -> 740 rejected");
        assert!(matches!(to_ogq, StickerError::UnsupportedTransform(_)));
        assert!(to_ogq.is_rejection());

        let again = set.to_kakao_size(&config).expect_err("360 -> 360 rejected");
        assert!(matches!(again, StickerError::UnsupportedTransform(_)));
        assert_eq!(set.label(), SizeLabel::Kakao360);
    }

    #[test]
    fn stale_batch_is_discarded() {
        let config = SlicerConfig::default();
        let mut set = native_set();

        let batch = set
            .begin_publish(PublishTarget::Kakao360)
            .expect("precondition")
            .expect("batch");
        let resized = batch.run(&config).expect("run");

        set.move_item(0, 3).expect("reorder while batch runs");

        let result = set.commit_publish(resized);
        assert!(matches!(result, Err(StickerError::State(_))));
        assert_eq!(set.label(), SizeLabel::Native { side: 20 });
        assert_eq!(set.get(3).map(StickerRaster::id), Some(0));
    }

    #[test]
    fn empty_set_operations_are_reported() {
        let config = SlicerConfig::default();
        let mut set = StickerSet::new(Vec::new(), SizeLabel::Native { side: 10 }, GridSpec::DEFAULT);

        assert!(matches!(set.to_kakao_size(&config), Err(StickerError::EmptySet(_))));
        assert!(matches!(set.derive_main(0, &config), Err(StickerError::EmptySet(_))));
        assert!(matches!(set.derive_tab(0, &config), Err(StickerError::EmptySet(_))));
    }

    #[test]
    fn derive_main_and_tab() {
        let config = SlicerConfig::default();
        let mut set = native_set();

        let main = set.derive_main(2, &config).expect("main");
        assert_eq!(main.pixels.dimensions(), (240, 240));
        assert_eq!(main.source_id, 2);

        let tab = set.derive_tab(5, &config).expect("tab");
        assert_eq!(tab.pixels.dimensions(), (96, 74));
        assert_eq!(tab.source_index, 5);

        set.derive_main(7, &config).expect("overwrite main");
        assert_eq!(set.main().map(|m| m.source_id), Some(7));

        assert!(matches!(
            set.derive_tab(8, &config),
            Err(StickerError::IndexOutOfRange { index: 8, len: 8 })
        ));
        assert_eq!(set.tab().map(|t| t.source_index), Some(5));
    }

    #[test]
    fn square_source_is_cropped_top_and_bottom() {
        let crop = center_crop_rect(1000, 1000, 96, 74);
        let expected_height = 1000.0 / (96.0 / 74.0);

        assert_eq!(crop.left, 0.0);
        assert_eq!(crop.width, 1000.0);
        assert!((crop.height - expected_height).abs() < 1e-9);
        assert!((crop.top - (1000.0 - expected_height) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn wide_source_is_cropped_left_and_right() {
        let crop = center_crop_rect(740, 400, 96, 74);
        let expected_width = 400.0 * (96.0 / 74.0);

        assert_eq!(crop.top, 0.0);
        assert_eq!(crop.height, 400.0);
        assert!((crop.width - expected_width).abs() < 1e-9);
        assert!((crop.left - (740.0 - expected_width) / 2.0).abs() < 1e-9);
    }
}
