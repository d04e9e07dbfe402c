//! # 网格检测模块
//!
//! ## 设计思路
//!
//! 从底图像素推断行列数，按优先级依次尝试：
//! 1. 标准底图尺寸直接命中登记表
//! 2. 边缘密度启发式（扫描线亮度跳变计数）
//! 3. 按固定单格边长推算
//! 4. 兜底默认网格
//!
//! 检测永远不会失败，总能返回一个合法网格，避免阻塞流水线。
//! 需要严格校验的调用方应自行核对 `cols * rows` 是否符合预期。

use image::{Rgba, RgbaImage};
use std::time::Instant;

use super::config::DetectorPolicy;
use super::{GridSpec, RasterSource, SlicerConfig};

/// 网格结果来自哪一级策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    Canonical,
    EdgeDensity,
    FixedTileSize,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDetection {
    pub grid: GridSpec,
    pub method: DetectionMethod,
}

/// 推断底图网格。纯函数，不修改输入。
pub fn detect_grid(sheet: &RasterSource, config: &SlicerConfig) -> GridDetection {
    let start = Instant::now();
    let (width, height) = sheet.dimensions();

    let detection = detect_inner(sheet.pixels(), config);

    log::info!(
        "🔍 网格检测完成 - 底图: {}x{} 网格: {} 方式: {:?} 耗时: {}ms",
        width,
        height,
        detection.grid,
        detection.method,
        start.elapsed().as_millis()
    );
    detection
}

fn detect_inner(pixels: &RgbaImage, config: &SlicerConfig) -> GridDetection {
    let (width, height) = pixels.dimensions();
    let policy = &config.detector;

    if let Some(sheet) = config.canonical_for(width, height) {
        if let Ok(grid) = sheet.grid().and_then(|g| config.check_grid(g)) {
            return GridDetection {
                grid,
                method: DetectionMethod::Canonical,
            };
        }
        log::warn!("⚠️ 标准底图 {}x{} 登记的网格无效，改用启发式", width, height);
    }

    if let Some(grid) = edge_density_candidate(pixels, policy) {
        if let Ok(grid) = config.check_grid(grid) {
            return GridDetection {
                grid,
                method: DetectionMethod::EdgeDensity,
            };
        }
    }

    let tile = policy.fallback_tile_size.max(1);
    let cols = (width / tile).min(config.max_grid_dimension);
    let rows = (height / tile).min(config.max_grid_dimension);
    if let Ok(grid) = GridSpec::new(cols, rows) {
        log::warn!(
            "⚠️ 启发式结果不可信，按 {}px 单格推算网格：{}",
            tile, grid
        );
        return GridDetection {
            grid,
            method: DetectionMethod::FixedTileSize,
        };
    }

    let grid = config
        .check_grid(policy.default_grid)
        .unwrap_or(GridSpec::DEFAULT);
    log::warn!("⚠️ 无法推算网格，回退默认网格：{}", grid);
    GridDetection {
        grid,
        method: DetectionMethod::Default,
    }
}

/// 边缘密度启发式，候选值落在可信区间外时返回 `None`。
pub(crate) fn edge_density_candidate(pixels: &RgbaImage, policy: &DetectorPolicy) -> Option<GridSpec> {
    let (width, height) = pixels.dimensions();
    if width < 2 || height < 2 {
        return None;
    }

    let vertical = count_boundary_lines(pixels, policy, Axis::Vertical);
    let horizontal = count_boundary_lines(pixels, policy, Axis::Horizontal);

    let cols = (vertical as f32 / policy.smoothing_factor).round() as u32;
    let rows = (horizontal as f32 / policy.smoothing_factor).round() as u32;

    log::debug!(
        "边缘密度：纵向格线扫描线={} 横向格线扫描线={} 候选={}×{}",
        vertical,
        horizontal,
        cols,
        rows
    );

    let cols_ok = (policy.min_cols..=policy.max_cols).contains(&cols);
    let rows_ok = (policy.min_rows..=policy.max_rows).contains(&rows);
    if !cols_ok || !rows_ok {
        log::debug!("候选网格 {}×{} 超出可信区间，丢弃", cols, rows);
        return None;
    }

    GridSpec::new(cols, rows).ok()
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    /// 竖直扫描线（固定 x，沿 y 走），用于推断列数。
    Vertical,
    /// 水平扫描线（固定 y，沿 x 走），用于推断行数。
    Horizontal,
}

fn count_boundary_lines(pixels: &RgbaImage, policy: &DetectorPolicy, axis: Axis) -> u32 {
    let (width, height) = pixels.dimensions();
    let (span, length) = match axis {
        Axis::Vertical => (width, height),
        Axis::Horizontal => (height, width),
    };

    let step = (span / policy.scan_divisor.max(1)).max(1) as usize;
    let limit = length as f32 * policy.density_ratio;

    let mut boundaries = 0;
    for line in (0..span).step_by(step) {
        let pixel_at = |i: u32| match axis {
            Axis::Vertical => pixels.get_pixel(line, i),
            Axis::Horizontal => pixels.get_pixel(i, line),
        };

        let mut jumps = 0u32;
        let mut prev = luminance(pixel_at(0));
        for i in 1..length {
            let current = luminance(pixel_at(i));
            if (current - prev).abs() > policy.luminance_threshold {
                jumps += 1;
            }
            prev = current;
        }

        if jumps as f32 > limit {
            boundaries += 1;
        }
    }
    boundaries
}

/// 按 alpha 加权的感知亮度，透明像素视为 0。
fn luminance(pixel: &Rgba<u8>) -> f32 {
    let [r, g, b, a] = pixel.0;
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) * (a as f32 / 255.0)
}
