//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，命令行入口与服务调用方只面对这一种错误，
//! 不再各自 `.map_err(|e| e.to_string())`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `StickerError` / `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于写入 JSON 响应。

use serde::Serialize;

use crate::sticker::StickerError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 切图流水线错误（加载 / 检测 / 切图 / 变换 / 导出）
    #[error("{0}")]
    Sticker(#[from] StickerError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 命令行参数或配置不可用
    #[error("参数错误: {0}")]
    Config(String),
}

impl AppError {
    /// 是否为“请求被拒绝、状态未改变”的可恢复错误。
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Sticker(e) if e.is_rejection())
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
