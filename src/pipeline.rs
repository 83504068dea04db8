use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::core::config::FusionConfig;
use crate::core::model::{DocumentFinal, PageFinal};
use crate::core::page_classifier::classify_text;
use crate::core::units::PageGeometry;
use crate::fusion::{FusionEngine, PagePasses, TileFusionEngine};
use crate::recognition::{run_pass, RecognitionService, TileSpec};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub fusion: FusionConfig,
    /// Pages fused concurrently; `0` lets rayon decide.
    pub jobs: usize,
}

impl PipelineConfig {
    pub fn new(input: PathBuf, output: PathBuf, fusion: FusionConfig) -> Self {
        Self {
            input,
            output,
            fusion,
            jobs: 0,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}

/// Recognition results for a whole document, as handed over by the dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInput {
    pub pages: Vec<PagePasses>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFailure {
    pub page_idx: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document: DocumentFinal,
    pub failures: Vec<PageFailure>,
}

pub fn load_document(path: &Path) -> Result<DocumentInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read recognition results: {}", path.display()))?;
    let input: DocumentInput = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse recognition results: {}", path.display()))?;
    Ok(input)
}

/// Runs the tiled pass and the optional whole-page pass for one page.
///
/// Both passes share `pool`, built once per job with [`recognition_pool`](crate::recognition::recognition_pool).
pub fn recognize_page<S>(
    pool: &ThreadPool,
    service: &S,
    page_idx: usize,
    geometry: PageGeometry,
    tiles: &[TileSpec],
    whole_page: Option<TileSpec>,
    text: Option<String>,
) -> PagePasses
where
    S: RecognitionService + Sync,
{
    let kind = text.as_deref().map(classify_text).unwrap_or_default();
    let tiled = run_pass(pool, service, tiles, kind);
    let global = whole_page.and_then(|tile| {
        run_pass(pool, service, std::slice::from_ref(&tile), kind)
            .into_iter()
            .next()
    });

    PagePasses {
        page_idx,
        geometry,
        kind: Some(kind),
        text,
        tiles: tiled,
        global,
    }
}

/// Fuses every page independently; a failing page is reported, not fatal.
pub fn fuse_document<E>(engine: &E, input: &DocumentInput) -> DocumentReport
where
    E: FusionEngine + Sync,
{
    let results: Vec<(usize, Result<PageFinal, String>)> = input
        .pages
        .par_iter()
        .map(|page| {
            let result = engine.fuse(page).map_err(|err| err.to_string());
            (page.page_idx, result)
        })
        .collect();

    let mut pages = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (page_idx, result) in results {
        match result {
            Ok(page) => pages.push(page),
            Err(reason) => {
                error!("page {page_idx} could not be fused: {reason}");
                failures.push(PageFailure { page_idx, reason });
            }
        }
    }

    DocumentReport {
        document: DocumentFinal { pages },
        failures,
    }
}

pub fn build_document(config: &PipelineConfig) -> Result<DocumentReport> {
    let input = load_document(&config.input)?;
    info!("fusing {} page(s) from {}", input.pages.len(), config.input.display());
    let engine = TileFusionEngine::new(config.fusion.clone());

    if config.jobs == 0 {
        return Ok(fuse_document(&engine, &input));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .context("failed to build page worker pool")?;
    Ok(pool.install(|| fuse_document(&engine, &input)))
}

pub fn export_document(report: &DocumentReport, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    fs::write(output, json).with_context(|| format!("failed to write: {}", output.display()))?;
    Ok(())
}
