pub mod config;
pub mod core;
pub mod export;
pub mod fusion;
pub mod heading;
pub mod layout;
pub mod parser;
pub mod pipeline;
pub mod rank;
pub mod sections;

pub use core::model::{HeadingCandidate, ParsedDocument, RankedMatch, Section};
