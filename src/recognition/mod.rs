pub mod bridge;
pub mod dispatch;

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::model::DiagramKind;
use crate::core::units::TileOffset;

pub use bridge::{ingest, IngestStats, RawRecognition};
pub use dispatch::{recognition_pool, run_pass};

/// One region of a rendered page handed to the recognition service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSpec {
    pub index: usize,
    #[serde(default)]
    pub offset: TileOffset,
    #[serde(default)]
    pub width_px: f64,
    #[serde(default)]
    pub height_px: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

/// Result of one tile call. `recognition` is `None` when the call failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileRecognition {
    pub tile: TileSpec,
    #[serde(default)]
    pub recognition: Option<RawRecognition>,
}

impl TileRecognition {
    pub fn failed(&self) -> bool {
        self.recognition.is_none()
    }
}

/// The external visual-recognition collaborator.
pub trait RecognitionService {
    fn recognize(&self, tile: &TileSpec, kind: DiagramKind) -> Result<RawRecognition>;
}
