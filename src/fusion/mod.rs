pub mod cluster;
pub mod compare;
pub mod connectivity;
pub mod cross_pass;
pub mod finalize;
pub mod nms;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::confidence::passes_threshold;
use crate::core::config::FusionConfig;
use crate::core::model::{CoordinateFrame, DiagramKind, Equipment, FusionStats, PageFinal, PassCandidates};
use crate::core::page_classifier::classify_text;
use crate::core::units::PageGeometry;
use crate::error::FusionError;
use crate::fusion::finalize::CoordinateNormalizer;
use crate::recognition::{ingest, TileRecognition};

/// Everything recognized for one page: the tiled pass and an optional whole-page pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePasses {
    pub page_idx: usize,
    pub geometry: PageGeometry,
    /// Forces the diagram kind; otherwise it is inferred from `text`.
    #[serde(default)]
    pub kind: Option<DiagramKind>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tiles: Vec<TileRecognition>,
    #[serde(default)]
    pub global: Option<TileRecognition>,
}

impl PagePasses {
    pub fn diagram_kind(&self) -> DiagramKind {
        self.kind
            .or_else(|| self.text.as_deref().map(classify_text))
            .unwrap_or_default()
    }
}

pub trait FusionEngine {
    fn fuse(&self, page: &PagePasses) -> Result<PageFinal, FusionError>;
}

#[derive(Debug, Default, Clone)]
pub struct TileFusionEngine {
    config: FusionConfig,
}

impl TileFusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    fn ingest_pass(&self, page: &PagePasses, results: &[&TileRecognition], stats: &mut FusionStats) -> PassCandidates {
        let mut pass = PassCandidates::default();
        for result in results {
            let Some(raw) = &result.recognition else {
                continue;
            };
            let (mut candidates, ingested) = ingest(raw, &result.tile, page.page_idx, &page.geometry);
            stats.degenerate_boxes += ingested.degenerate_boxes;
            stats.short_paths += ingested.short_paths;
            stats.malformed_entries += ingested.malformed;

            let min = self.config.min_confidence;
            candidates.equipment.retain(|e| passes_threshold(e.confidence, min));
            candidates.connections.retain(|c| passes_threshold(c.confidence, min));
            pass.extend(candidates);
        }
        pass
    }

    /// NMS followed by centroid clustering over one pass's equipment.
    fn dedup_within_pass(&self, equipment: &[Equipment], stats: &mut FusionStats) -> Vec<Equipment> {
        let suppressed = nms::suppress(equipment, self.config.nms_iou_threshold);
        stats.after_nms += suppressed.len();
        let merged = cluster::cluster_and_merge(&suppressed, self.config.cluster_epsilon_px);
        stats.after_clustering += merged.len();
        merged
    }
}

impl FusionEngine for TileFusionEngine {
    fn fuse(&self, page: &PagePasses) -> Result<PageFinal, FusionError> {
        if !page.geometry.is_valid() {
            return Err(FusionError::InvalidPageGeometry {
                page: page.page_idx,
                reason: format!("{:?}", page.geometry),
            });
        }

        let tiles_failed = page.tiles.iter().filter(|t| t.failed()).count();
        let global_ok = page.global.as_ref().is_some_and(|g| !g.failed());
        if tiles_failed == page.tiles.len() && !global_ok {
            return Err(FusionError::NoSuccessfulPass { page: page.page_idx });
        }
        if tiles_failed > 0 {
            warn!(
                "page {}: {} of {} tiles failed, fusing the rest",
                page.page_idx,
                tiles_failed,
                page.tiles.len()
            );
        }

        let kind = page.diagram_kind();
        let mut stats = FusionStats {
            tiles_total: page.tiles.len(),
            tiles_failed,
            ..FusionStats::default()
        };

        let tile_refs: Vec<&TileRecognition> = page.tiles.iter().collect();
        let tiled = self.ingest_pass(page, &tile_refs, &mut stats);
        let global = page
            .global
            .as_ref()
            .filter(|g| !g.failed())
            .map(|g| self.ingest_pass(page, &[g], &mut stats));

        stats.tiled_candidates = tiled.equipment.len();
        stats.global_candidates = global.as_ref().map_or(0, |g| g.equipment.len());

        let tiled_equipment = self.dedup_within_pass(&tiled.equipment, &mut stats);
        let mut equipment = match &global {
            Some(global) => {
                let global_equipment = self.dedup_within_pass(&global.equipment, &mut stats);
                cross_pass::dedup_passes(&tiled_equipment, &global_equipment, &self.config)
            }
            None => tiled_equipment,
        };
        stats.after_cross_pass = equipment.len();
        equipment.sort_by(|a, b| {
            let (ca, cb) = (a.center(), b.center());
            ca.y.total_cmp(&cb.y).then(ca.x.total_cmp(&cb.x))
        });

        let mut connections = tiled.connections;
        let mut endpoints = tiled.endpoints;
        if let Some(global) = global {
            connections.extend(global.connections);
            endpoints.extend(global.endpoints);
        }
        stats.connections_in = connections.len();
        stats.endpoints_in = endpoints.len();

        let graph = connectivity::reconcile(&connections, &endpoints, &equipment, &self.config);
        stats.connections_out = graph.connections.len();
        stats.leftovers = graph.leftovers.len();
        debug!("page {} stats: {:?}", page.page_idx, stats);

        let normalizer = CoordinateNormalizer::new(
            page.geometry,
            kind,
            self.config.grid_quantum_mm,
            self.config.origin,
        );

        info!(
            "page {}: {} equipment, {} connections, {} leftovers ({:?})",
            page.page_idx,
            equipment.len(),
            graph.connections.len(),
            graph.leftovers.len(),
            kind
        );

        Ok(PageFinal {
            page_idx: page.page_idx,
            kind,
            frame: CoordinateFrame::Millimeter,
            width_mm: page.geometry.width_mm,
            height_mm: page.geometry.height_mm,
            equipment: equipment.iter().map(|e| normalizer.equipment(e)).collect(),
            connections: graph.connections.iter().map(|c| normalizer.connection(c)).collect(),
            resolved_endpoints: graph
                .resolved_endpoints
                .iter()
                .map(|r| normalizer.resolved(r))
                .collect(),
            leftovers: graph.leftovers.iter().map(|e| normalizer.endpoint(e)).collect(),
            stats,
        })
    }
}
