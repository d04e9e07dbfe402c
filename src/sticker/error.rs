//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 切图链路中的所有失败都收敛到单一枚举，调用侧可按分支匹配。
//! 除输入/编码类错误外，其余分支都属于“可恢复”：请求的操作没有发生，
//! 调用方换一个合法的前置状态再试即可，不会终止进程。

/// 贴纸切图统一错误类型。
///
/// 该类型会在应用层被上转为 `AppError`。
#[derive(Debug, thiserror::Error)]
pub enum StickerError {
    /// 网格行列解析为 0 或超出上限，切图请求被拒绝。
    #[error("无效网格：{0}")]
    InvalidGrid(String),

    /// 当前尺寸状态不满足变换前置条件（例如对 360 尺寸再转 740×640）。
    #[error("不支持的变换：{0}")]
    UnsupportedTransform(String),

    /// 对空集合执行变换或重排。
    #[error("贴纸集合为空：{0}")]
    EmptySet(String),

    #[error("索引越界：{index}（当前共 {len} 张）")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    /// 会话状态异常：锁中毒、批处理结果已被新请求取代等。
    #[error("状态错误：{0}")]
    State(String),
}

impl StickerError {
    /// 是否为“操作未发生”类的可恢复拒绝。
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidGrid(_)
                | Self::UnsupportedTransform(_)
                | Self::EmptySet(_)
                | Self::IndexOutOfRange { .. }
        )
    }
}

impl From<StickerError> for String {
    fn from(error: StickerError) -> Self {
        error.to_string()
    }
}
