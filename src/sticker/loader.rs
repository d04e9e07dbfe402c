//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（Data URL / Base64 / 本地文件 / 内存字节）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验，尽快失败。
//!
//! ## 实现思路
//!
//! - Base64：格式解析 + 解码前体积预估 + 解码后体积限制。
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 全部来源最终都经过文件签名（magic bytes）校验，确认是图片。

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use super::source::RawSheetData;
use super::{SheetInput, SlicerConfig, StickerError};

/// 按来源加载底图原始字节。
pub(crate) fn load_raw(input: SheetInput, config: &SlicerConfig) -> Result<RawSheetData, StickerError> {
    match input {
        SheetInput::DataUrl(data) => load_from_base64(&data, config, "data-url"),
        SheetInput::Base64(data) => load_from_base64(&data, config, "base64"),
        SheetInput::FilePath(path) => load_from_file(&path, config),
        SheetInput::Bytes(bytes) => {
            check_size(bytes.len() as u64, config.max_file_size)?;
            validate_image_signature(&bytes)?;
            Ok(RawSheetData {
                bytes,
                source_hint: "bytes",
            })
        }
    }
}

fn load_from_base64(
    data: &str,
    config: &SlicerConfig,
    source_hint: &'static str,
) -> Result<RawSheetData, StickerError> {
    log::info!("📝 开始处理 {} 底图", source_hint);

    let bytes = parse_base64_with_limit(data, config.max_file_size)?;
    check_size(bytes.len() as u64, config.max_file_size)?;
    validate_image_signature(&bytes)?;

    Ok(RawSheetData { bytes, source_hint })
}

fn load_from_file(path: &Path, config: &SlicerConfig) -> Result<RawSheetData, StickerError> {
    log::info!("📁 开始读取本地底图 - 路径: {}", path.display());

    if !path.exists() {
        return Err(StickerError::FileSystem(format!(
            "文件不存在：{}",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| StickerError::FileSystem(format!("无法读取文件信息：{}", e)))?;
    check_size(metadata.len(), config.max_file_size)?;

    let bytes = std::fs::read(path)
        .map_err(|e| StickerError::FileSystem(format!("无法读取底图文件：{}", e)))?;
    validate_image_signature(&bytes)?;

    Ok(RawSheetData {
        bytes,
        source_hint: "file",
    })
}

fn check_size(len: u64, max_file_size: u64) -> Result<(), StickerError> {
    if len > max_file_size {
        return Err(StickerError::ResourceLimit(format!(
            "文件过大：{:.2} MB（限制：{:.2} MB）",
            len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }
    Ok(())
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, StickerError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| StickerError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| StickerError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

/// 解析 Base64 输入（支持 Data URL / 纯 Base64）。
pub(crate) fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, StickerError> {
    let normalized = data.trim();

    let payload = if normalized.starts_with("data:") {
        if !normalized.starts_with("data:image/") {
            return Err(StickerError::InvalidFormat("Data URL 不是图片类型".to_string()));
        }
        let base64_start = normalized
            .find(";base64,")
            .ok_or_else(|| StickerError::InvalidFormat("缺少 base64 标记".to_string()))?;
        &normalized[base64_start + 8..]
    } else {
        normalized
    };

    let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
    if estimated_len > max_file_size {
        return Err(StickerError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| StickerError::Decode(format!("Base64 解码失败：{}", e)))
}

/// 通过文件签名校验输入是否为图片。
fn validate_image_signature(bytes: &[u8]) -> Result<(), StickerError> {
    if bytes.is_empty() {
        return Err(StickerError::InvalidFormat("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| StickerError::InvalidFormat("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(StickerError::InvalidFormat(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(())
}
