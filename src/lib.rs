pub mod core;
pub mod error;
pub mod fusion;
pub mod pipeline;
pub mod recognition;

pub use crate::core::config::FusionConfig;
pub use crate::core::model::{Connection, DiagramKind, DocumentFinal, Endpoint, Equipment, PageFinal};
pub use error::FusionError;
pub use fusion::{FusionEngine, PagePasses, TileFusionEngine};
