use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::units::Origin;

/// Tolerance multipliers per physical size class for cross-pass dedup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SizeMultipliers {
    pub large: f64,
    pub medium: f64,
    pub small: f64,
}

impl Default for SizeMultipliers {
    fn default() -> Self {
        Self {
            large: 2.5,
            medium: 1.0,
            small: 0.5,
        }
    }
}

/// Tunable thresholds for every fusion stage.
///
/// Distances ending in `_px` are in page-global pixels of the render the
/// detections came from; `grid_quantum_mm` applies after conversion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionConfig {
    /// IoU at or above which the lower-confidence box is suppressed
    pub nms_iou_threshold: f64,
    /// Centroid distance linking two detections into one cluster
    pub cluster_epsilon_px: f64,
    /// Minimum path similarity for two same-pair connections to merge
    pub connection_merge_threshold: f64,
    /// Resampling resolution used by path similarity
    pub path_samples: usize,
    /// Radius within which an endpoint snaps onto equipment
    pub snap_radius_px: f64,
    /// Distance under which two endpoints are the same wire end
    pub endpoint_epsilon_px: f64,
    /// Base tolerance for cross-pass dedup before size scaling
    pub cross_pass_base_tolerance_px: f64,
    pub size_multipliers: SizeMultipliers,
    /// Candidates below this confidence never enter fusion
    pub min_confidence: f64,
    /// Grid spacing for diagram kinds that require alignment
    pub grid_quantum_mm: f64,
    pub origin: Origin,
    /// Upper bound on concurrent recognition calls per pass
    pub max_concurrency: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            nms_iou_threshold: 0.55,
            cluster_epsilon_px: 10.0,
            connection_merge_threshold: 0.8,
            path_samples: 32,
            snap_radius_px: 25.0,
            endpoint_epsilon_px: 10.0,
            cross_pass_base_tolerance_px: 10.0,
            size_multipliers: SizeMultipliers::default(),
            min_confidence: 0.0,
            grid_quantum_mm: 4.0,
            origin: Origin::TopLeft,
            max_concurrency: 4,
        }
    }
}

impl FusionConfig {
    /// Merges less aggressively: tighter radii, higher overlap required.
    pub fn strict() -> Self {
        Self {
            nms_iou_threshold: 0.7,
            cluster_epsilon_px: 5.0,
            connection_merge_threshold: 0.9,
            snap_radius_px: 15.0,
            endpoint_epsilon_px: 5.0,
            cross_pass_base_tolerance_px: 6.0,
            min_confidence: 0.2,
            ..Self::default()
        }
    }

    /// Merges more aggressively, for noisy low-resolution renders.
    pub fn lenient() -> Self {
        Self {
            nms_iou_threshold: 0.4,
            cluster_epsilon_px: 15.0,
            connection_merge_threshold: 0.7,
            snap_radius_px: 40.0,
            endpoint_epsilon_px: 15.0,
            cross_pass_base_tolerance_px: 15.0,
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: FusionConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        Ok(config.validated())
    }

    /// Pulls out-of-range values back to usable ones.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        self.nms_iou_threshold = unit_or(self.nms_iou_threshold, defaults.nms_iou_threshold);
        self.connection_merge_threshold =
            unit_or(self.connection_merge_threshold, defaults.connection_merge_threshold);
        self.min_confidence = unit_or(self.min_confidence, defaults.min_confidence);
        self.cluster_epsilon_px = non_negative_or(self.cluster_epsilon_px, defaults.cluster_epsilon_px);
        self.snap_radius_px = non_negative_or(self.snap_radius_px, defaults.snap_radius_px);
        self.endpoint_epsilon_px =
            non_negative_or(self.endpoint_epsilon_px, defaults.endpoint_epsilon_px);
        self.cross_pass_base_tolerance_px = non_negative_or(
            self.cross_pass_base_tolerance_px,
            defaults.cross_pass_base_tolerance_px,
        );
        self.size_multipliers.large =
            non_negative_or(self.size_multipliers.large, defaults.size_multipliers.large);
        self.size_multipliers.medium =
            non_negative_or(self.size_multipliers.medium, defaults.size_multipliers.medium);
        self.size_multipliers.small =
            non_negative_or(self.size_multipliers.small, defaults.size_multipliers.small);
        self.grid_quantum_mm = non_negative_or(self.grid_quantum_mm, defaults.grid_quantum_mm);
        self.path_samples = self.path_samples.max(2);
        self.max_concurrency = self.max_concurrency.max(1);
        self
    }
}

fn unit_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

fn non_negative_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}
