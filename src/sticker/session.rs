//! # 会话编排模块
//!
//! ## 设计思路
//!
//! `StickerSession` 把界面上的状态（当前底图、当前平台、当前集合、主图/标签图选中位置）
//! 显式收拢为字段，前置条件由类型与方法自身保证，而不是依赖界面条件判断。
//!
//! 处理链路：
//! 1. `load_sheet`：加载并解码底图，清空旧结果
//! 2. `crop`：检测（或使用给定）网格并切图，整体替换旧集合
//! 3. `resize_to_kakao` / `convert_to_ogq` / `create_main` / `create_tab`
//! 4. `move_sticker` / `swap_stickers`：重排
//! 5. `export`：按当前顺序编码导出
//!
//! ## 实现思路
//!
//! - 单次操作内使用同一份配置快照，避免处理中途配置漂移。
//! - 记录各阶段耗时，便于性能诊断。

use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::detector::{detect_grid, GridDetection};
use super::export::{build_manifest, export_derived, export_set, ExportManifest, ExportedBlob};
use super::set::DerivedRaster;
use super::transform::TransformOutcome;
use super::{
    decode_sheet, tile_sheet, GridSpec, RasterSource, SheetInput, SlicerConfig, StickerError,
    StickerSet,
};

/// 发布平台。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// 即时通讯表情包：切图后可缩放到 360×360。
    Kakao,
    /// 内容市场表情包：主图 + 标签图 + 740×640。
    Ogq,
}

impl Platform {
    pub fn from_str(value: &str) -> Result<Self, StickerError> {
        match value.trim().to_lowercase().as_str() {
            "kakao" => Ok(Self::Kakao),
            "ogq" => Ok(Self::Ogq),
            other => Err(StickerError::InvalidFormat(format!(
                "未知平台：{}（可选：kakao / ogq）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kakao => "kakao",
            Self::Ogq => "ogq",
        }
    }
}

/// 一次导出的全部产物。
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub stickers: Vec<ExportedBlob>,
    pub derived: Vec<ExportedBlob>,
    pub manifest: ExportManifest,
}

impl ExportBundle {
    /// 按集合当前顺序编码全部贴纸与已生成的派生图。
    pub fn build(
        set: &StickerSet,
        platform: Option<Platform>,
        config: &SlicerConfig,
    ) -> Result<Self, StickerError> {
        Ok(Self {
            stickers: export_set(set, config)?,
            derived: export_derived(set)?,
            manifest: build_manifest(set, platform),
        })
    }

    pub fn all_blobs(&self) -> impl Iterator<Item = &ExportedBlob> {
        self.stickers.iter().chain(&self.derived)
    }
}

/// 切图会话。
pub struct StickerSession {
    config: SlicerConfig,
    sheet: Option<RasterSource>,
    set: Option<StickerSet>,
    platform: Option<Platform>,
    selected_main: usize,
    selected_tab: usize,
}

impl StickerSession {
    pub fn new(config: SlicerConfig) -> Self {
        Self {
            config,
            sheet: None,
            set: None,
            platform: None,
            selected_main: 0,
            selected_tab: 0,
        }
    }

    pub fn config(&self) -> &SlicerConfig {
        &self.config
    }

    /// 替换配置，只影响之后的操作。
    pub fn set_config(&mut self, config: SlicerConfig) -> Result<(), StickerError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn sheet(&self) -> Option<&RasterSource> {
        self.sheet.as_ref()
    }

    pub fn set(&self) -> Option<&StickerSet> {
        self.set.as_ref()
    }

    pub(crate) fn set_mut(&mut self) -> Result<&mut StickerSet, StickerError> {
        self.set
            .as_mut()
            .ok_or_else(|| StickerError::EmptySet("尚未切图".to_string()))
    }

    fn current_set(&self) -> Result<&StickerSet, StickerError> {
        self.set
            .as_ref()
            .ok_or_else(|| StickerError::EmptySet("尚未切图".to_string()))
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub fn selected_main(&self) -> usize {
        self.selected_main
    }

    pub fn selected_tab(&self) -> usize {
        self.selected_tab
    }

    /// 加载新底图，丢弃旧集合、派生图与平台选择。
    pub fn load_sheet(&mut self, input: SheetInput) -> Result<&RasterSource, StickerError> {
        let sheet = decode_sheet(input, &self.config)?;
        Ok(self.replace_sheet(sheet))
    }

    /// 直接使用已解码的底图。
    pub fn replace_sheet(&mut self, sheet: RasterSource) -> &RasterSource {
        self.set = None;
        self.platform = None;
        self.selected_main = 0;
        self.selected_tab = 0;
        self.sheet.insert(sheet)
    }

    fn current_sheet(&self) -> Result<&RasterSource, StickerError> {
        self.sheet
            .as_ref()
            .ok_or_else(|| StickerError::State("尚未加载底图".to_string()))
    }

    pub fn detect_grid(&self) -> Result<GridDetection, StickerError> {
        Ok(detect_grid(self.current_sheet()?, &self.config))
    }

    /// 为指定平台切图；未给网格时自动检测。旧集合及其派生图整体丢弃。
    pub fn crop(&mut self, platform: Platform, grid: Option<GridSpec>) -> Result<&StickerSet, StickerError> {
        let total_start = Instant::now();
        let sheet = self.current_sheet()?;

        let grid = match grid {
            Some(grid) => grid,
            None => detect_grid(sheet, &self.config).grid,
        };
        let set = tile_sheet(sheet, grid, &self.config)?;

        log::info!(
            "✅ {} 切图完成 - {} 张 total={}ms",
            platform.as_str(),
            set.len(),
            total_start.elapsed().as_millis()
        );

        Ok(self.install_set(platform, set))
    }

    /// 整体替换当前集合，选中位置归零。
    pub(crate) fn install_set(&mut self, platform: Platform, set: StickerSet) -> &StickerSet {
        self.platform = Some(platform);
        self.selected_main = 0;
        self.selected_tab = 0;
        self.set.insert(set)
    }

    pub fn resize_to_kakao(&mut self) -> Result<TransformOutcome, StickerError> {
        let config = self.config.clone();
        self.set_mut()?.to_kakao_size(&config)
    }

    pub fn convert_to_ogq(&mut self) -> Result<TransformOutcome, StickerError> {
        let config = self.config.clone();
        self.set_mut()?.to_ogq_size(&config)
    }

    pub fn select_main(&mut self, index: usize) -> Result<(), StickerError> {
        self.current_set()?.check_index(index)?;
        self.selected_main = index;
        Ok(())
    }

    pub fn select_tab(&mut self, index: usize) -> Result<(), StickerError> {
        self.current_set()?.check_index(index)?;
        self.selected_tab = index;
        Ok(())
    }

    /// 按当前选中位置生成主图。
    pub fn create_main(&mut self) -> Result<&DerivedRaster, StickerError> {
        let index = self.selected_main;
        let config = self.config.clone();
        self.set_mut()?.derive_main(index, &config)
    }

    /// 按当前选中位置生成标签图。
    pub fn create_tab(&mut self) -> Result<&DerivedRaster, StickerError> {
        let index = self.selected_tab;
        let config = self.config.clone();
        self.set_mut()?.derive_tab(index, &config)
    }

    pub fn move_sticker(&mut self, from: usize, to: usize) -> Result<(), StickerError> {
        self.set_mut()?.move_item(from, to)
    }

    pub fn swap_stickers(&mut self, a: usize, b: usize) -> Result<(), StickerError> {
        self.set_mut()?.swap(a, b)
    }

    /// 按当前顺序导出全部贴纸与已生成的派生图。
    pub fn export(&self) -> Result<ExportBundle, StickerError> {
        ExportBundle::build(self.current_set()?, self.platform, &self.config)
    }
}

impl Default for StickerSession {
    fn default() -> Self {
        Self::new(SlicerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sticker::test_support::png_bytes;
    use crate::sticker::SizeLabel;
    use image::{Rgba, RgbaImage};

    fn session_with_sheet(width: u32, height: u32) -> StickerSession {
        let mut session = StickerSession::default();
        session.replace_sheet(RasterSource::from_rgba(RgbaImage::from_pixel(
            width,
            height,
            Rgba([50, 60, 70, 255]),
        )));
        session
    }

    #[test]
    fn crop_without_sheet_is_a_state_error() {
        let mut session = StickerSession::default();
        assert!(matches!(
            session.crop(Platform::Kakao, None),
            Err(StickerError::State(_))
        ));
        assert!(matches!(session.resize_to_kakao(), Err(StickerError::EmptySet(_))));
    }

    #[test]
    fn kakao_flow() {
        let mut session = session_with_sheet(80, 40);

        let set = session
            .crop(Platform::Kakao, Some(GridSpec { cols: 4, rows: 2 }))
            .expect("crop");
        assert_eq!(set.len(), 8);

        session.resize_to_kakao().expect("resize");
        let bundle = session.export().expect("export");

        assert_eq!(bundle.stickers.len(), 8);
        assert_eq!(bundle.stickers[0].file_name, "sticker_01_360.png");
        assert!(bundle.derived.is_empty());
        assert_eq!(bundle.manifest.platform, Some(Platform::Kakao));
    }

    #[test]
    fn ogq_flow_with_selected_indices() {
        let mut session = session_with_sheet(80, 40);
        session
            .crop(Platform::Ogq, Some(GridSpec { cols: 4, rows: 2 }))
            .expect("crop");

        session.select_main(3).expect("select main");
        session.select_tab(6).expect("select tab");
        assert!(matches!(
            session.select_tab(8),
            Err(StickerError::IndexOutOfRange { .. })
        ));
        assert_eq!(session.selected_tab(), 6);

        assert_eq!(session.create_main().expect("main").source_index, 3);
        assert_eq!(session.create_tab().expect("tab").source_index, 6);
        session.convert_to_ogq().expect("convert");

        let bundle = session.export().expect("export");
        assert_eq!(bundle.stickers[7].file_name, "sticker_08_ogq.png");
        assert_eq!(bundle.derived.len(), 2);
        assert_eq!(bundle.all_blobs().count(), 10);
    }

    #[test]
    fn new_crop_replaces_set_and_drops_derived() {
        let mut session = session_with_sheet(80, 40);
        session
            .crop(Platform::Ogq, Some(GridSpec { cols: 4, rows: 2 }))
            .expect("crop");
        session.select_main(5).expect("select");
        session.create_main().expect("main");

        session
            .crop(Platform::Kakao, Some(GridSpec { cols: 2, rows: 1 }))
            .expect("recrop");

        let set = session.set().expect("set");
        assert_eq!(set.len(), 2);
        assert!(set.main().is_none());
        assert_eq!(session.selected_main(), 0);
        assert_eq!(session.platform(), Some(Platform::Kakao));
    }

    #[test]
    fn loading_a_new_sheet_clears_everything() {
        let mut session = session_with_sheet(80, 40);
        session
            .crop(Platform::Kakao, Some(GridSpec { cols: 4, rows: 2 }))
            .expect("crop");

        session
            .load_sheet(SheetInput::Bytes(png_bytes(30, 30)))
            .expect("load");

        assert!(session.set().is_none());
        assert!(session.platform().is_none());
        assert_eq!(session.sheet().map(RasterSource::dimensions), Some((30, 30)));
    }

    #[test]
    fn crop_detects_grid_when_not_given() {
        let mut session = session_with_sheet(3000, 2000);
        let set = session.crop(Platform::Kakao, None).expect("crop");

        assert_eq!(set.grid(), GridSpec { cols: 3, rows: 2 });
        assert_eq!(set.label(), SizeLabel::Native { side: 1000 });
    }

    #[test]
    fn reorder_through_session() {
        let mut session = session_with_sheet(80, 40);
        session
            .crop(Platform::Kakao, Some(GridSpec { cols: 4, rows: 1 }))
            .expect("crop");

        session.move_sticker(0, 2).expect("move");
        assert_eq!(session.set().map(StickerSet::ids), Some(vec![1, 2, 0, 3]));
        session.swap_stickers(0, 3).expect("swap");
        assert_eq!(session.set().map(StickerSet::ids), Some(vec![3, 2, 0, 1]));
    }

    #[test]
    fn platform_parsing() {
        assert_eq!(Platform::from_str(" OGQ ").expect("ogq"), Platform::Ogq);
        assert_eq!(Platform::Kakao.as_str(), "kakao");
        assert!(Platform::from_str("line").is_err());
    }
}
