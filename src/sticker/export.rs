//! # 导出模块
//!
//! ## 设计思路
//!
//! 把当前顺序下的贴纸编码为 PNG，并按固定规则命名：
//! `sticker_<两位序号><尺寸后缀>.png`，序号从 01 开始，取导出时刻的顺序。
//! 主图/标签图分别命名为 `ogq_main_240x240.png` / `ogq_tab_96x74.png`。
//!
//! ## 实现思路
//!
//! - 编码是独立的 CPU 任务，整套并行执行。
//! - 落盘时自动创建目录，并附带 `manifest.json` 描述导出内容。

use base64::{Engine as _, engine::general_purpose};
use image::{ImageFormat, RgbaImage};
use serde::Serialize;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::batch::parallel_map;
use super::set::DerivedKind;
use super::{GridSpec, Platform, SizeLabel, SlicerConfig, StickerError, StickerSet};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// 一张已编码的导出图。
#[derive(Debug, Clone)]
pub struct ExportedBlob {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl ExportedBlob {
    /// 转为 `data:image/png;base64,...`，供界面直接展示。
    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(&self.png)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub position: usize,
    pub id: u32,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DerivedEntry {
    pub kind: DerivedKind,
    pub file_name: String,
    pub source_index: usize,
    pub source_id: u32,
}

/// 导出清单。
#[derive(Debug, Clone, Serialize)]
pub struct ExportManifest {
    pub created_at: String,
    pub platform: Option<Platform>,
    pub size_label: SizeLabel,
    pub grid: GridSpec,
    pub stickers: Vec<ManifestEntry>,
    pub derived: Vec<DerivedEntry>,
}

/// 第 `index`（从 0 开始）张贴纸的文件名。
pub fn sticker_file_name(index: usize, label: SizeLabel) -> String {
    format!("sticker_{:02}{}.png", index + 1, label.file_suffix())
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, StickerError> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| StickerError::Encode(format!("PNG 编码失败：{}", e)))?;
    Ok(cursor.into_inner())
}

/// 按当前顺序导出整套贴纸。
pub fn export_set(set: &StickerSet, config: &SlicerConfig) -> Result<Vec<ExportedBlob>, StickerError> {
    set.ensure_not_empty("导出")?;
    let start = Instant::now();
    let label = set.label();

    let positions: Vec<usize> = (0..set.len()).collect();
    let blobs = parallel_map(&positions, config.workers, |&index| {
        let raster = set.check_index(index)?;
        Ok(ExportedBlob {
            file_name: sticker_file_name(index, label),
            width: raster.width(),
            height: raster.height(),
            png: encode_png(raster.pixels())?,
        })
    })?;

    log::info!(
        "📦 导出编码完成 - {} 张（{}）耗时: {}ms",
        blobs.len(),
        label,
        start.elapsed().as_millis()
    );
    Ok(blobs)
}

/// 单张导出。
pub fn export_sticker(set: &StickerSet, index: usize) -> Result<ExportedBlob, StickerError> {
    set.ensure_not_empty("导出")?;
    let raster = set.check_index(index)?;
    Ok(ExportedBlob {
        file_name: sticker_file_name(index, set.label()),
        width: raster.width(),
        height: raster.height(),
        png: encode_png(raster.pixels())?,
    })
}

/// 导出已生成的主图/标签图（未生成的跳过）。
pub fn export_derived(set: &StickerSet) -> Result<Vec<ExportedBlob>, StickerError> {
    set.main()
        .into_iter()
        .chain(set.tab())
        .map(|derived| {
            Ok(ExportedBlob {
                file_name: derived.kind.file_name().to_string(),
                width: derived.pixels.width(),
                height: derived.pixels.height(),
                png: encode_png(&derived.pixels)?,
            })
        })
        .collect()
}

pub fn build_manifest(set: &StickerSet, platform: Option<Platform>) -> ExportManifest {
    let label = set.label();
    let stickers = set
        .rasters()
        .iter()
        .enumerate()
        .map(|(position, raster)| ManifestEntry {
            position,
            id: raster.id(),
            file_name: sticker_file_name(position, label),
            width: raster.width(),
            height: raster.height(),
        })
        .collect();
    let derived = set
        .main()
        .into_iter()
        .chain(set.tab())
        .map(|d| DerivedEntry {
            kind: d.kind,
            file_name: d.kind.file_name().to_string(),
            source_index: d.source_index,
            source_id: d.source_id,
        })
        .collect();

    ExportManifest {
        created_at: chrono::Local::now().to_rfc3339(),
        platform,
        size_label: label,
        grid: set.grid(),
        stickers,
        derived,
    }
}

/// 写入目录，不存在时自动创建。返回写入的文件路径（含清单）。
pub fn write_export(
    dir: &Path,
    blobs: &[ExportedBlob],
    manifest: &ExportManifest,
) -> Result<Vec<PathBuf>, StickerError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            StickerError::FileSystem(format!("创建导出目录 '{}' 失败：{}", dir.display(), e))
        })?;
    }

    let mut written = Vec::with_capacity(blobs.len() + 1);
    for blob in blobs {
        let path = dir.join(&blob.file_name);
        fs::write(&path, &blob.png)
            .map_err(|e| StickerError::FileSystem(format!("写入 {} 失败：{}", blob.file_name, e)))?;
        written.push(path);
    }

    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let content = serde_json::to_string_pretty(manifest)
        .map_err(|e| StickerError::Encode(format!("序列化导出清单失败：{}", e)))?;
    fs::write(&manifest_path, content)
        .map_err(|e| StickerError::FileSystem(format!("写入导出清单失败：{}", e)))?;
    written.push(manifest_path);

    log::info!("💾 已写入 {} 个文件到 {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sticker::{tile_sheet, RasterSource};
    use image::Rgba;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn small_set() -> StickerSet {
        let sheet = RasterSource::from_rgba(RgbaImage::from_fn(40, 20, |x, _| {
            Rgba([(x / 10) as u8, 0, 0, 255])
        }));
        tile_sheet(&sheet, GridSpec { cols: 4, rows: 2 }, &SlicerConfig::default())
            .expect("tiling should succeed")
    }

    #[test]
    fn file_names_follow_label_and_position() {
        assert_eq!(sticker_file_name(0, SizeLabel::Native { side: 1000 }), "sticker_01.png");
        assert_eq!(sticker_file_name(31, SizeLabel::Kakao360), "sticker_32_360.png");
        assert_eq!(sticker_file_name(8, SizeLabel::Ogq740x640), "sticker_09_ogq.png");
        assert_eq!(sticker_file_name(99, SizeLabel::Kakao360), "sticker_100_360.png");
    }

    #[test]
    fn reorder_changes_names_not_pixels() {
        let config = SlicerConfig::default();
        let mut set = small_set();
        let before = export_set(&set, &config).expect("export");

        set.move_item(0, 2).expect("move");
        let after = export_set(&set, &config).expect("export");

        assert_eq!(after[2].file_name, "sticker_03.png");
        assert_eq!(after[2].png, before[0].png);
        assert_eq!(after[0].png, before[1].png);
    }

    #[test]
    fn exported_png_decodes_back_with_alpha() {
        let image = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 40]));
        let png = encode_png(&image).expect("encode");

        let decoded = image::load_from_memory(&png).expect("decode").to_rgba8();

        assert_eq!(decoded.get_pixel(1, 1), &Rgba([10, 20, 30, 40]));
    }

    #[test]
    fn data_url_prefix() {
        let blob = ExportedBlob {
            file_name: "x.png".to_string(),
            width: 1,
            height: 1,
            png: vec![1, 2, 3],
        };
        assert_eq!(blob.to_data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn derived_blobs_use_fixed_names() {
        let config = SlicerConfig::default();
        let mut set = small_set();
        assert!(export_derived(&set).expect("none yet").is_empty());

        set.derive_main(0, &config).expect("main");
        set.derive_tab(1, &config).expect("tab");
        let names: Vec<String> = export_derived(&set)
            .expect("derived")
            .into_iter()
            .map(|b| b.file_name)
            .collect();

        assert_eq!(names, vec!["ogq_main_240x240.png", "ogq_tab_96x74.png"]);
    }

    #[test]
    fn write_export_creates_directory_and_manifest() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("sticker_export_{}", nanos)).join("nested");
        let set = small_set();
        let blobs = export_set(&set, &SlicerConfig::default()).expect("export");
        let manifest = build_manifest(&set, Some(Platform::Kakao));

        let written = write_export(&dir, &blobs, &manifest).expect("write");

        assert_eq!(written.len(), 9);
        assert!(dir.join("sticker_08.png").exists());
        let content = fs::read_to_string(dir.join(MANIFEST_FILE_NAME)).expect("manifest");
        let json: serde_json::Value = serde_json::from_str(&content).expect("json");
        assert_eq!(json["platform"], "kakao");
        assert_eq!(json["stickers"].as_array().map(Vec::len), Some(8));
        assert_eq!(json["stickers"][7]["file_name"], "sticker_08.png");

        let _ = fs::remove_dir_all(dir.parent().unwrap_or(&dir));
    }
}
