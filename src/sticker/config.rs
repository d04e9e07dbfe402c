//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `SlicerConfig`：标准底图登记表、网格检测阈值、
//! 回退网格、重采样质量与批处理并发数。检测阈值全部是经验值，
//! 因此只作为策略常量暴露，而不是写死在算法里。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的配置。
//! - 整体可用 `serde_json` 读写，文件中缺失的字段回退到默认值。
//! - `ResizeQuality` 负责档位字符串解析与反向输出，并映射到具体滤镜。

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::{GridSpec, StickerError};

/// 已登记的标准底图尺寸及其固定网格。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSheet {
    pub width: u32,
    pub height: u32,
    pub cols: u32,
    pub rows: u32,
}

impl CanonicalSheet {
    pub const fn new(width: u32, height: u32, cols: u32, rows: u32) -> Self {
        Self {
            width,
            height,
            cols,
            rows,
        }
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    pub fn grid(&self) -> Result<GridSpec, StickerError> {
        GridSpec::new(self.cols, self.rows)
    }
}

/// 边缘密度检测策略。
///
/// 所有数值均为经验调参结果，调整时应使用样例底图回归验证。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorPolicy {
    /// 相邻像素亮度差超过该值视为一次跳变（0~255）。
    pub luminance_threshold: f32,
    /// 扫描线上跳变数超过 `长度 * density_ratio` 即判定为位于格线附近。
    pub density_ratio: f32,
    /// 扫描线间隔 = 边长 / scan_divisor。
    pub scan_divisor: u32,
    /// 格线扫描线计数除以该因子后四舍五入，得到行列候选值。
    pub smoothing_factor: f32,
    pub min_cols: u32,
    pub max_cols: u32,
    pub min_rows: u32,
    pub max_rows: u32,
    /// 启发式结果不可信时，按固定正方形单格边长推算行列。
    pub fallback_tile_size: u32,
    /// 最终兜底网格。
    pub default_grid: GridSpec,
}

impl Default for DetectorPolicy {
    fn default() -> Self {
        Self {
            luminance_threshold: 30.0,
            density_ratio: 0.3,
            scan_divisor: 100,
            smoothing_factor: 10.0,
            min_cols: 2,
            max_cols: 10,
            min_rows: 2,
            max_rows: 20,
            fallback_tile_size: 1000,
            default_grid: GridSpec::DEFAULT,
        }
    }
}

/// 重采样质量档位。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与速度平衡
/// - `Speed`：优先速度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeQuality {
    Quality,
    Balanced,
    Speed,
}

impl ResizeQuality {
    /// 从外部字符串解析档位。
    pub fn from_str(profile: &str) -> Result<Self, StickerError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(StickerError::InvalidFormat(format!(
                "未知质量档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }

    pub fn filter(self) -> FilterType {
        match self {
            Self::Quality => FilterType::CatmullRom,
            Self::Balanced => FilterType::Triangle,
            Self::Speed => FilterType::Nearest,
        }
    }
}

/// 切图配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerConfig {
    /// 命中即直接返回固定网格，优先于任何启发式。
    pub canonical_sheets: Vec<CanonicalSheet>,
    /// 已按 740×640 排好的底图：切图时每格直接输出 740×640，跳过正方形中间态。
    pub preshaped_sheets: Vec<CanonicalSheet>,
    pub detector: DetectorPolicy,
    /// 行/列允许的最大值，防止病态的格子数量。
    pub max_grid_dimension: u32,
    pub quality: ResizeQuality,
    /// 批处理并行线程数，0 表示使用 rayon 全局线程池。
    pub workers: usize,
    /// 读取原始字节时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            canonical_sheets: vec![
                CanonicalSheet::new(4000, 8000, 4, 8),
                CanonicalSheet::new(4000, 6000, 4, 6),
                CanonicalSheet::new(5000, 4000, 5, 4),
            ],
            preshaped_sheets: vec![CanonicalSheet::new(2960, 5120, 4, 8)],
            detector: DetectorPolicy::default(),
            max_grid_dimension: GridSpec::MAX_DIMENSION,
            quality: ResizeQuality::Balanced,
            workers: 0,
            max_file_size: 100 * 1024 * 1024,
            max_decoded_pixels: 64_000_000,
        }
    }
}

impl SlicerConfig {
    /// 从 JSON 文件读取配置，缺失字段使用默认值。
    pub fn load_from_path(path: &Path) -> Result<Self, StickerError> {
        let content = fs::read_to_string(path).map_err(|e| {
            StickerError::FileSystem(format!("读取配置文件 '{}' 失败：{}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| StickerError::InvalidFormat(format!("解析配置文件失败：{}", e)))?;
        config.validate()?;

        log::info!(
            "⚙️ 已加载配置：{}（quality={}, workers={}）",
            path.display(),
            config.quality.as_str(),
            config.workers
        );
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), StickerError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| StickerError::InvalidFormat(format!("序列化配置失败：{}", e)))?;
        fs::write(path, content)
            .map_err(|e| StickerError::FileSystem(format!("写入配置文件失败：{}", e)))
    }

    /// 校验配置之间的一致性。
    pub fn validate(&self) -> Result<(), StickerError> {
        let d = &self.detector;
        if self.max_grid_dimension == 0 {
            return Err(StickerError::InvalidFormat(
                "max_grid_dimension 必须大于 0".to_string(),
            ));
        }
        if d.scan_divisor == 0 {
            return Err(StickerError::InvalidFormat("scan_divisor 必须大于 0".to_string()));
        }
        if d.smoothing_factor <= 0.0 {
            return Err(StickerError::InvalidFormat(
                "smoothing_factor 必须大于 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&d.density_ratio) {
            return Err(StickerError::InvalidFormat(
                "density_ratio 必须在 0~1 之间".to_string(),
            ));
        }
        if d.fallback_tile_size == 0 {
            return Err(StickerError::InvalidFormat(
                "fallback_tile_size 必须大于 0".to_string(),
            ));
        }
        if d.min_cols > d.max_cols || d.min_rows > d.max_rows {
            return Err(StickerError::InvalidFormat("检测行列区间上下限颠倒".to_string()));
        }
        self.check_grid(d.default_grid)?;
        for sheet in self.canonical_sheets.iter().chain(&self.preshaped_sheets) {
            self.check_grid(sheet.grid()?)?;
        }
        Ok(())
    }

    /// 按 `max_grid_dimension` 校验网格。
    pub fn check_grid(&self, grid: GridSpec) -> Result<GridSpec, StickerError> {
        let grid = GridSpec::new(grid.cols, grid.rows)?;
        if grid.cols > self.max_grid_dimension || grid.rows > self.max_grid_dimension {
            return Err(StickerError::InvalidGrid(format!(
                "{}×{} 超过上限 {}",
                grid.cols, grid.rows, self.max_grid_dimension
            )));
        }
        Ok(grid)
    }

    pub fn canonical_for(&self, width: u32, height: u32) -> Option<&CanonicalSheet> {
        self.canonical_sheets
            .iter()
            .chain(&self.preshaped_sheets)
            .find(|sheet| sheet.matches(width, height))
    }

    pub fn is_preshaped(&self, width: u32, height: u32) -> bool {
        self.preshaped_sheets
            .iter()
            .any(|sheet| sheet.matches(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("sticker_slicer_{}_{}.json", name, nanos))
    }

    #[test]
    fn default_config_is_valid() {
        SlicerConfig::default().validate().expect("default config should be valid");
    }

    #[test]
    fn quality_profile_roundtrip() {
        for name in ["quality", "balanced", "speed"] {
            let quality = ResizeQuality::from_str(name).expect("known profile");
            assert_eq!(quality.as_str(), name);
        }
        assert_eq!(
            ResizeQuality::from_str(" Speed ").expect("trimmed").filter(),
            FilterType::Nearest
        );
        assert!(matches!(
            ResizeQuality::from_str("ultra"),
            Err(StickerError::InvalidFormat(_))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{ "quality": "speed", "detector": { "smoothing_factor": 8.0 } }"#)
            .expect("write temp config");

        let config = SlicerConfig::load_from_path(&path).expect("load partial config");
        let _ = fs::remove_file(&path);

        assert_eq!(config.quality, ResizeQuality::Speed);
        assert_eq!(config.detector.smoothing_factor, 8.0);
        assert_eq!(config.detector.density_ratio, 0.3);
        assert_eq!(config.detector.default_grid, GridSpec::DEFAULT);
        assert_eq!(config.canonical_sheets.len(), 3);
    }

    #[test]
    fn save_then_load_keeps_custom_sheets() {
        let path = temp_path("save");
        let mut config = SlicerConfig::default();
        config.canonical_sheets.push(CanonicalSheet::new(2000, 3000, 2, 3));
        config.save_to_path(&path).expect("save config");

        let loaded = SlicerConfig::load_from_path(&path).expect("reload config");
        let _ = fs::remove_file(&path);

        assert!(loaded.canonical_for(2000, 3000).is_some());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let path = temp_path("invalid");
        fs::write(&path, r#"{ "detector": { "scan_divisor": 0 } }"#).expect("write temp config");
        let result = SlicerConfig::load_from_path(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(StickerError::InvalidFormat(_))));

        let mut config = SlicerConfig::default();
        config.canonical_sheets.push(CanonicalSheet::new(100, 100, 0, 2));
        assert!(matches!(config.validate(), Err(StickerError::InvalidGrid(_))));
    }

    #[test]
    fn missing_file_is_a_filesystem_error() {
        let result = SlicerConfig::load_from_path(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(StickerError::FileSystem(_))));
    }

    #[test]
    fn preshaped_sheet_is_also_canonical() {
        let config = SlicerConfig::default();
        assert!(config.is_preshaped(2960, 5120));
        assert!(!config.is_preshaped(4000, 8000));
        assert_eq!(
            config.canonical_for(2960, 5120).map(|s| (s.cols, s.rows)),
            Some((4, 8))
        );
    }
}
