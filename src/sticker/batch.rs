//! 批处理并行映射。
//!
//! 每个元素的计算相互独立；全部完成后才返回整批结果，
//! 任一元素失败则整批作废，调用方看不到“半新半旧”的结果。

use rayon::prelude::*;

use super::StickerError;

/// 并行映射，`workers == 0` 时使用 rayon 全局线程池。结果保持输入顺序。
pub(crate) fn parallel_map<T, R, F>(items: &[T], workers: usize, f: F) -> Result<Vec<R>, StickerError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R, StickerError> + Sync + Send,
{
    if workers == 0 {
        return items.par_iter().map(&f).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| StickerError::State(format!("创建线程池失败：{}", e)))?;

    pool.install(|| items.par_iter().map(&f).collect())
}
