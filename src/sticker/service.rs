//! # 服务层（可共享状态）
//!
//! ## 设计思路
//!
//! `StickerService` 把 `StickerSession` 包在 `Arc<Mutex<..>>` 中，供异步调用方共享。
//! 重计算（解码、切图、整套缩放、编码）放到 `spawn_blocking` 中执行，期间不持锁，
//! 重排等轻量操作在计算期间依然可用。
//!
//! ## 实现思路
//!
//! - 计算前在锁内拍快照（底图或集合 revision），计算后重新加锁提交。
//! - 提交时发现快照已过期（底图被替换、集合被重排或重切），整批结果丢弃并返回
//!   `StickerError::State`，不会出现“半新半旧”的集合。
//! - 锁中毒统一映射为 `StickerError::State`。

use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;

use super::detector::detect_grid;
use super::session::{ExportBundle, Platform, StickerSession};
use super::transform::{PublishTarget, TransformOutcome};
use super::{decode_sheet, tile_sheet, GridSpec, SheetInput, SlicerConfig, StickerError, StickerSet};

static SHARED: Lazy<StickerService> = Lazy::new(StickerService::default);

/// 异步切图服务。克隆后共享同一个会话。
#[derive(Clone)]
pub struct StickerService {
    session: Arc<Mutex<StickerSession>>,
}

impl StickerService {
    pub fn new(config: SlicerConfig) -> Self {
        Self::with_session(StickerSession::new(config))
    }

    pub fn with_session(session: StickerSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// 进程内共享实例（默认配置）。
    pub fn shared() -> &'static StickerService {
        &SHARED
    }

    fn lock(&self) -> Result<MutexGuard<'_, StickerSession>, StickerError> {
        self.session
            .lock()
            .map_err(|_| StickerError::State("会话锁已中毒".to_string()))
    }

    /// 在锁内读取会话状态。
    pub fn inspect<R>(&self, f: impl FnOnce(&StickerSession) -> R) -> Result<R, StickerError> {
        Ok(f(&*self.lock()?))
    }

    async fn run_blocking<R, F>(task: F) -> Result<R, StickerError>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R, StickerError> + Send + 'static,
    {
        tokio::task::spawn_blocking(task)
            .await
            .map_err(|e| StickerError::State(format!("后台任务执行失败：{}", e)))?
    }

    /// 加载并解码底图，返回其尺寸。
    pub async fn load_sheet(&self, input: SheetInput) -> Result<(u32, u32), StickerError> {
        let config = self.lock()?.config().clone();
        let sheet = Self::run_blocking(move || decode_sheet(input, &config)).await?;

        let mut session = self.lock()?;
        Ok(session.replace_sheet(sheet).dimensions())
    }

    /// 切图。计算期间底图被替换时结果作废。
    pub async fn crop(&self, platform: Platform, grid: Option<GridSpec>) -> Result<usize, StickerError> {
        let (sheet, config) = {
            let session = self.lock()?;
            let sheet = session
                .sheet()
                .cloned()
                .ok_or_else(|| StickerError::State("尚未加载底图".to_string()))?;
            (sheet, session.config().clone())
        };

        let tiled_from = sheet.clone();
        let set = Self::run_blocking(move || {
            let grid = grid.unwrap_or_else(|| detect_grid(&sheet, &config).grid);
            tile_sheet(&sheet, grid, &config)
        })
        .await?;

        let mut session = self.lock()?;
        match session.sheet() {
            Some(current) if current.is_same_sheet(&tiled_from) => {
                Ok(session.install_set(platform, set).len())
            }
            _ => {
                log::warn!("⚠️ 切图期间底图已被替换，结果丢弃");
                Err(StickerError::State("切图期间底图已被替换，结果已作废".to_string()))
            }
        }
    }

    pub async fn resize_to_kakao(&self) -> Result<TransformOutcome, StickerError> {
        self.publish(PublishTarget::Kakao360).await
    }

    pub async fn convert_to_ogq(&self) -> Result<TransformOutcome, StickerError> {
        self.publish(PublishTarget::Ogq740x640).await
    }

    /// 整套缩放：锁内拍快照，锁外并行计算，再锁内按 revision 提交。
    async fn publish(&self, target: PublishTarget) -> Result<TransformOutcome, StickerError> {
        let (batch, config) = {
            let mut session = self.lock()?;
            let config = session.config().clone();
            (session.set_mut()?.begin_publish(target)?, config)
        };

        let Some(batch) = batch else {
            log::info!("ℹ️ 已是 {}，跳过转换", target.label());
            return Ok(TransformOutcome::AlreadyApplied);
        };

        let resized = Self::run_blocking(move || batch.run(&config)).await?;
        self.lock()?.set_mut()?.commit_publish(resized)
    }

    pub fn select_main(&self, index: usize) -> Result<(), StickerError> {
        self.lock()?.select_main(index)
    }

    pub fn select_tab(&self, index: usize) -> Result<(), StickerError> {
        self.lock()?.select_tab(index)
    }

    /// 生成主图，返回其来源贴纸 id。
    pub fn create_main(&self) -> Result<u32, StickerError> {
        Ok(self.lock()?.create_main()?.source_id)
    }

    /// 生成标签图，返回其来源贴纸 id。
    pub fn create_tab(&self) -> Result<u32, StickerError> {
        Ok(self.lock()?.create_tab()?.source_id)
    }

    pub fn move_sticker(&self, from: usize, to: usize) -> Result<(), StickerError> {
        self.lock()?.move_sticker(from, to)
    }

    pub fn swap_stickers(&self, a: usize, b: usize) -> Result<(), StickerError> {
        self.lock()?.swap_stickers(a, b)
    }

    /// 当前顺序的贴纸 id。
    pub fn order(&self) -> Result<Vec<u32>, StickerError> {
        self.inspect(|session| session.set().map(StickerSet::ids).unwrap_or_default())
    }

    /// 以调用时刻的顺序导出；编码在后台执行，不阻塞其他操作。
    pub async fn export(&self) -> Result<ExportBundle, StickerError> {
        let (set, platform, config) = {
            let session = self.lock()?;
            let set = session
                .set()
                .cloned()
                .ok_or_else(|| StickerError::EmptySet("尚未切图".to_string()))?;
            (set, session.platform(), session.config().clone())
        };

        Self::run_blocking(move || ExportBundle::build(&set, platform, &config)).await
    }
}

impl Default for StickerService {
    fn default() -> Self {
        Self::new(SlicerConfig::default())
    }
}
