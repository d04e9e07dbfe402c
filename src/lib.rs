//! # 贴纸切图工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 调用方 (CLI / 异步服务)                   │
//! │                                                          │
//! │  main.rs ── pico-args 参数 ── StickerSession             │
//! │  StickerService ── Arc<Mutex<StickerSession>>            │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            核心 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  └─ sticker ──── 切图流水线                               │
//! │      ├─ decode / loader   来源加载·校验·解码              │
//! │      ├─ detector          网格检测                        │
//! │      ├─ tiler             行优先切图                      │
//! │      ├─ transform         360 / 740×640 / 主图 / 标签图   │
//! │      ├─ set               有序集合·重排                   │
//! │      └─ export            PNG 编码·命名·落盘              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，CLI 与服务层的对外错误 |
//! | [`sticker`] | 底图加载、网格检测、切图、尺寸变换、重排、导出 |

pub mod error;
pub mod sticker;
