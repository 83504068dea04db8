use serde::{Deserialize, Serialize};

use crate::core::geometry::{BBox, Point};

/// Which unit and origin a set of coordinates is expressed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateFrame {
    TilePixel,
    PagePixel,
    Millimeter,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    /// Piping and instrumentation; the baseline kind.
    #[default]
    Process,
    Electrical,
}

impl DiagramKind {
    /// Electrical schematics feed a CAD grid downstream.
    pub fn requires_grid(&self) -> bool {
        matches!(self, DiagramKind::Electrical)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    #[default]
    Undirected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Equipment {
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub bbox: BBox,
    pub page: usize,
    pub confidence: f64,
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Equipment {
    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    pub fn has_tag(&self) -> bool {
        self.tag.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_tag: Option<String>,
    pub path: Vec<Point>,
    pub direction: Direction,
    pub confidence: f64,
    pub page: usize,
}

impl Connection {
    pub fn start(&self) -> Option<Point> {
        self.path.first().copied()
    }

    pub fn end(&self) -> Option<Point> {
        self.path.last().copied()
    }

    pub fn is_resolved(&self) -> bool {
        self.from_tag.is_some() && self.to_tag.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint_tag: Option<String>,
    pub point: Point,
    pub page: usize,
}

/// An endpoint that snapped onto a tagged piece of equipment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedEndpoint {
    pub endpoint: Endpoint,
    pub tag: String,
    pub distance: f64,
}

/// Candidates of a single recognition pass over one page, in page-global pixels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassCandidates {
    pub equipment: Vec<Equipment>,
    pub connections: Vec<Connection>,
    pub endpoints: Vec<Endpoint>,
}

impl PassCandidates {
    pub fn extend(&mut self, other: PassCandidates) {
        self.equipment.extend(other.equipment);
        self.connections.extend(other.connections);
        self.endpoints.extend(other.endpoints);
    }

    pub fn is_empty(&self) -> bool {
        self.equipment.is_empty() && self.connections.is_empty() && self.endpoints.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FusionStats {
    pub tiles_total: usize,
    pub tiles_failed: usize,
    /// Entries dropped at ingestion, summed over both passes.
    pub degenerate_boxes: usize,
    pub short_paths: usize,
    pub malformed_entries: usize,
    pub tiled_candidates: usize,
    pub global_candidates: usize,
    pub after_nms: usize,
    pub after_clustering: usize,
    pub after_cross_pass: usize,
    pub connections_in: usize,
    pub connections_out: usize,
    pub endpoints_in: usize,
    pub leftovers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFinal {
    pub page_idx: usize,
    pub kind: DiagramKind,
    pub frame: CoordinateFrame,
    pub width_mm: f64,
    pub height_mm: f64,
    pub equipment: Vec<Equipment>,
    pub connections: Vec<Connection>,
    pub resolved_endpoints: Vec<ResolvedEndpoint>,
    pub leftovers: Vec<Endpoint>,
    pub stats: FusionStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFinal {
    pub pages: Vec<PageFinal>,
}
