pub mod confidence;
pub mod config;
pub mod geometry;
pub mod model;
pub mod page_classifier;
pub mod units;
