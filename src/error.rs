use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("page {page}: every recognition pass failed")]
    NoSuccessfulPass { page: usize },
    #[error("page {page}: invalid page geometry: {reason}")]
    InvalidPageGeometry { page: usize, reason: String },
}
