use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{info, warn};

use crate::core::model::DiagramKind;
use crate::recognition::{RecognitionService, TileRecognition, TileSpec};

/// Worker pool bounding how many recognition calls are in flight at once.
///
/// Build it once per job and hand it to every [`run_pass`].
pub fn recognition_pool(max_concurrency: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(max_concurrency.max(1))
        .thread_name(|i| format!("recognize-{i}"))
        .build()
        .context("failed to build recognition worker pool")
}

/// Runs every tile of one pass through the recognition service on `pool`.
///
/// The call returns only once every tile has finished, in tile order. A failing
/// tile is logged and comes back with no recognition instead of failing the pass.
pub fn run_pass<S>(pool: &ThreadPool, service: &S, tiles: &[TileSpec], kind: DiagramKind) -> Vec<TileRecognition>
where
    S: RecognitionService + Sync,
{
    let results: Vec<TileRecognition> = pool.install(|| {
        tiles
            .par_iter()
            .map(|tile| {
                let recognition = match service.recognize(tile, kind) {
                    Ok(raw) => Some(raw),
                    Err(err) => {
                        warn!("recognition failed for tile {}: {err:#}", tile.index);
                        None
                    }
                };
                TileRecognition {
                    tile: tile.clone(),
                    recognition,
                }
            })
            .collect()
    });

    let failed = results.iter().filter(|r| r.failed()).count();
    info!("pass finished: {} tiles, {} failed", results.len(), failed);
    results
}
