//! # 贴纸切图工具 — 命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与调用顺序。
//! 业务逻辑分布在 `sticker` 子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;

use sticker_slicer::error::AppError;
use sticker_slicer::sticker::{
    write_export, GridSpec, Platform, SheetInput, SlicerConfig, StickerSession,
};

const HELP: &str = "\
sticker-slicer <SHEET> --platform kakao|ogq [选项]

选项：
  --cols N --rows N   指定网格（缺省时自动检测）
  --resize            kakao：缩放到 360×360；ogq：转换为 740×640
  --main N            ogq：用第 N 张（从 1 开始）生成 240×240 主图
  --tab N             ogq：用第 N 张（从 1 开始）生成 96×74 标签图
  --config FILE       JSON 配置文件
  --out DIR           导出目录（默认 ./stickers）
";

struct CliArgs {
    sheet: PathBuf,
    platform: Platform,
    grid: Option<GridSpec>,
    resize: bool,
    main: Option<usize>,
    tab: Option<usize>,
    config: Option<PathBuf>,
    out: PathBuf,
}

fn parse_args() -> Result<Option<CliArgs>, AppError> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let arg_error = |e: pico_args::Error| AppError::Config(e.to_string());

    let platform: String = args.value_from_str("--platform").map_err(arg_error)?;
    let cols: Option<u32> = args.opt_value_from_str("--cols").map_err(arg_error)?;
    let rows: Option<u32> = args.opt_value_from_str("--rows").map_err(arg_error)?;
    let resize = args.contains("--resize");
    let main: Option<usize> = args.opt_value_from_str("--main").map_err(arg_error)?;
    let tab: Option<usize> = args.opt_value_from_str("--tab").map_err(arg_error)?;
    let config: Option<PathBuf> = args.opt_value_from_str("--config").map_err(arg_error)?;
    let out: Option<PathBuf> = args.opt_value_from_str("--out").map_err(arg_error)?;
    let sheet: PathBuf = args.free_from_str().map_err(arg_error)?;

    let rest = args.finish();
    if !rest.is_empty() {
        return Err(AppError::Config(format!("无法识别的参数：{:?}", rest)));
    }

    let grid = match (cols, rows) {
        (Some(cols), Some(rows)) => Some(GridSpec::new(cols, rows)?),
        (None, None) => None,
        _ => return Err(AppError::Config("--cols 与 --rows 需同时给出".to_string())),
    };

    Ok(Some(CliArgs {
        sheet,
        platform: Platform::from_str(&platform)?,
        grid,
        resize,
        main: main.map(to_position).transpose()?,
        tab: tab.map(to_position).transpose()?,
        config,
        out: out.unwrap_or_else(|| PathBuf::from("./stickers")),
    }))
}

/// 命令行序号从 1 开始，内部位置从 0 开始。
fn to_position(ordinal: usize) -> Result<usize, AppError> {
    ordinal
        .checked_sub(1)
        .ok_or_else(|| AppError::Config("序号从 1 开始".to_string()))
}

fn run(args: CliArgs) -> Result<(), AppError> {
    let config = match &args.config {
        Some(path) => SlicerConfig::load_from_path(path)?,
        None => SlicerConfig::default(),
    };

    if args.platform == Platform::Kakao && (args.main.is_some() || args.tab.is_some()) {
        return Err(AppError::Config("--main / --tab 仅适用于 ogq 平台".to_string()));
    }

    let mut session = StickerSession::new(config);
    let (width, height) = session.load_sheet(SheetInput::FilePath(args.sheet))?.dimensions();

    if args.grid.is_none() {
        let detection = session.detect_grid()?;
        log::info!(
            "🔍 {}x{} 检测网格: {}（{:?}）",
            width,
            height,
            detection.grid,
            detection.method
        );
    }
    session.crop(args.platform, args.grid)?;

    if let Some(index) = args.main {
        session.select_main(index)?;
        session.create_main()?;
    }
    if let Some(index) = args.tab {
        session.select_tab(index)?;
        session.create_tab()?;
    }

    if args.resize {
        match args.platform {
            Platform::Kakao => session.resize_to_kakao()?,
            Platform::Ogq => session.convert_to_ogq()?,
        };
    }

    let bundle = session.export()?;
    let blobs: Vec<_> = bundle.all_blobs().cloned().collect();
    let written = write_export(&args.out, &blobs, &bundle.manifest)?;
    log::info!("✅ 完成 - 共写入 {} 个文件", written.len());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            print!("{}", HELP);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            log::error!("{err}");
            eprint!("{}", HELP);
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ {err}");
            ExitCode::FAILURE
        }
    }
}
