//! # 贴纸切图模块（sticker）
//!
//! ## 设计思路
//!
//! 把“底图加载 → 网格检测 → 切图 → 平台尺寸变换 → 重排 → 导出”按职责拆分为子模块：
//!
//! - `loader` / `decode`：来源加载、安全校验、解码与像素限制
//! - `detector`：推断网格行列（已登记尺寸 → 边缘密度 → 固定格宽 → 默认）
//! - `tiler`：按行优先顺序切图，生成全新集合
//! - `transform`：360×360 / 740×640 整套缩放与主图/标签图派生
//! - `set`：有序集合与重排
//! - `export`：PNG 编码、命名与落盘
//! - `session` / `service`：同步会话与异步共享服务
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 实现思路
//!
//! 对外仅暴露必要类型与入口函数，`batch`、`resample` 等内部细节保持私有。
//!
//! ## 新同事快速上手
//!
//! ```text
//! SheetInput
//!    ↓
//! decode.rs（加载 + 解码 + 像素限制）
//!    ↓
//! detector.rs（GridSpec）
//!    ↓
//! tiler.rs（StickerSet，标签 Native / Ogq）
//!    ↓
//! transform.rs（Kakao360 / Ogq740x640 / 主图 / 标签图）
//!    ↓
//! export.rs（sticker_NN<后缀>.png + manifest.json）
//! ```

mod batch;
mod config;
mod decode;
mod detector;
mod error;
mod export;
mod loader;
mod resample;
mod service;
mod session;
mod set;
mod source;
mod tiler;
mod transform;

pub use config::{CanonicalSheet, DetectorPolicy, ResizeQuality, SlicerConfig};
pub use decode::decode_sheet;
pub use detector::{detect_grid, DetectionMethod, GridDetection};
pub use error::StickerError;
pub use export::{
    build_manifest, encode_png, export_derived, export_set, export_sticker, sticker_file_name,
    write_export, DerivedEntry, ExportManifest, ExportedBlob, ManifestEntry, MANIFEST_FILE_NAME,
};
pub use resample::CropRect;
pub use service::StickerService;
pub use session::{ExportBundle, Platform, StickerSession};
pub use set::{DerivedKind, DerivedRaster, SizeLabel, StickerRaster, StickerSet};
pub use source::{GridSpec, RasterSource, SheetInput, Tile};
pub use tiler::{tile_rects, tile_sheet};
pub use transform::{center_crop_rect, PublishBatch, PublishTarget, ResizedBatch, TransformOutcome};
