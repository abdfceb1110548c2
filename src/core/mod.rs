pub mod geometry;
pub mod line_classifier;
pub mod model;
pub mod stats;
pub mod text;
