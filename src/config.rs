//! Collection and tuning settings read from a JSON document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::line_classifier::ClassifierParams;
use crate::core::text::WordBudget;
use crate::export::round1b::DEFAULT_TOP_K_OUTPUT;
use crate::fusion::ProximityFusionEngine;
use crate::heading::HeuristicParams;
use crate::rank::e5::DEFAULT_MODEL_ID;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} could not be read", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration file {} is not valid: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("collection '{name}' not found (available: {available})")]
    UnknownCollection { name: String, available: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Kept in file order.
    pub collections: IndexMap<String, CollectionConfig>,
    pub output_settings: OutputSettings,
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionConfig {
    pub input_folder: PathBuf,
    pub persona: String,
    pub job_to_be_done: String,
    /// Embedded verbatim and compared against heading candidates.
    pub job_query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSettings {
    pub output_folder: PathBuf,
    /// Matches kept per document before section extraction.
    pub top_k_matches: usize,
    /// Sections kept across the whole collection.
    #[serde(default = "default_top_k_output")]
    pub top_k_output: usize,
    #[serde(default)]
    pub save_individual_results: bool,
}

fn default_top_k_output() -> usize {
    DEFAULT_TOP_K_OUTPUT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionSettings {
    pub larger_font_ratio: f32,
    pub paragraph_gap_ratio: f32,
    pub width_threshold_ratio: f32,
    pub centered_tolerance: f32,
    pub short_line_words: usize,
    pub fusion_y_tolerance: f32,
    pub fusion_max_words: usize,
    pub box_tolerance: f32,
    pub render_dpi: u32,
    pub layout_timeout_secs: u64,
    pub max_lines: usize,
    pub word_budget: usize,
    pub lookahead_words: usize,
    pub enable_layout_detection: bool,
    pub layout_script: PathBuf,
    pub layout_model_dir: Option<PathBuf>,
    pub python: PathBuf,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            larger_font_ratio: 1.15,
            paragraph_gap_ratio: 1.2,
            width_threshold_ratio: 0.75,
            centered_tolerance: 20.0,
            short_line_words: 10,
            fusion_y_tolerance: 20.0,
            fusion_max_words: 8,
            box_tolerance: 5.0,
            render_dpi: 150,
            layout_timeout_secs: 300,
            max_lines: 1000,
            word_budget: 150,
            lookahead_words: 50,
            enable_layout_detection: false,
            layout_script: PathBuf::from("scripts/layout_bridge.py"),
            layout_model_dir: None,
            python: PathBuf::from("python3"),
        }
    }
}

impl ExtractionSettings {
    pub fn heuristic_params(&self) -> HeuristicParams {
        HeuristicParams {
            classifier: ClassifierParams {
                larger_font_ratio: self.larger_font_ratio,
                width_threshold_ratio: self.width_threshold_ratio,
                centered_tolerance: self.centered_tolerance,
                short_line_words: self.short_line_words,
            },
            paragraph_gap_ratio: self.paragraph_gap_ratio,
            max_lines: self.max_lines,
        }
    }

    pub fn fusion(&self) -> ProximityFusionEngine {
        ProximityFusionEngine::new(self.fusion_y_tolerance, self.fusion_max_words)
    }

    pub fn word_budget(&self) -> WordBudget {
        WordBudget {
            max_words: self.word_budget,
            lookahead: self.lookahead_words,
        }
    }

    pub fn layout_timeout(&self) -> Duration {
        Duration::from_secs(self.layout_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_id: String,
    pub cache_dir: Option<PathBuf>,
    /// Directory with `config.json`, `tokenizer.json` and `model.safetensors`;
    /// used instead of the hub when set.
    pub model_dir: Option<PathBuf>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            cache_dir: None,
            model_dir: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_settings.top_k_matches == 0 {
            return Err(ConfigError::Invalid("top_k_matches must be greater than zero".to_string()));
        }
        if self.output_settings.top_k_output == 0 {
            return Err(ConfigError::Invalid("top_k_output must be greater than zero".to_string()));
        }

        let extraction = &self.extraction;
        let ratios = [
            ("larger_font_ratio", extraction.larger_font_ratio),
            ("paragraph_gap_ratio", extraction.paragraph_gap_ratio),
            ("width_threshold_ratio", extraction.width_threshold_ratio),
        ];
        for (name, value) in ratios {
            if !(value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if extraction.render_dpi == 0 {
            return Err(ConfigError::Invalid("render_dpi must be greater than zero".to_string()));
        }
        if extraction.word_budget == 0 {
            return Err(ConfigError::Invalid("word_budget must be greater than zero".to_string()));
        }

        for (name, collection) in &self.collections {
            if collection.job_query.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("collection '{name}' has an empty job_query")));
            }
        }
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Result<&CollectionConfig, ConfigError> {
        self.collections
            .get(name)
            .ok_or_else(|| ConfigError::UnknownCollection {
                name: name.to_string(),
                available: self.collections.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"{
        "collections": {
            "Collection 2": {
                "input_folder": "Collection 2/PDFs",
                "persona": "HR professional",
                "job_to_be_done": "Create and manage fillable forms.",
                "job_query": "fillable forms onboarding compliance"
            },
            "Collection 1": {
                "input_folder": "Collection 1/PDFs",
                "persona": "Travel Planner",
                "job_to_be_done": "Plan a trip of 4 days.",
                "job_query": "group trip itinerary"
            }
        },
        "output_settings": {
            "output_folder": "output",
            "top_k_matches": 5,
            "save_individual_results": true
        }
    }"#;

    #[test]
    fn fills_defaults_and_keeps_collection_order() -> anyhow::Result<()> {
        let config: AppConfig = serde_json::from_str(MINIMAL)?;
        config.validate()?;

        assert_eq!(config.output_settings.top_k_output, 20);
        assert_eq!(config.extraction, ExtractionSettings::default());
        assert_eq!(config.embedding.model_id, "intfloat/e5-small-v2");
        let names: Vec<&str> = config.collections.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Collection 2", "Collection 1"]);
        assert_eq!(config.extraction.heuristic_params(), HeuristicParams::default());
        assert_eq!(config.extraction.word_budget(), WordBudget::default());
        Ok(())
    }

    #[test]
    fn partial_extraction_block_overrides_only_given_fields() -> anyhow::Result<()> {
        let mut value: serde_json::Value = serde_json::from_str(MINIMAL)?;
        value["extraction"] = serde_json::json!({ "fusion_y_tolerance": 12.5, "enable_layout_detection": true });
        let config: AppConfig = serde_json::from_value(value)?;

        assert_eq!(config.extraction.fusion().y_tolerance, 12.5);
        assert_eq!(config.extraction.fusion().max_words, 8);
        assert!(config.extraction.enable_layout_detection);
        assert_eq!(config.extraction.render_dpi, 150);
        Ok(())
    }

    #[test]
    fn rejects_zero_top_k() -> anyhow::Result<()> {
        let mut config: AppConfig = serde_json::from_str(MINIMAL)?;
        config.output_settings.top_k_matches = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn unknown_collection_lists_available_names() -> anyhow::Result<()> {
        let config: AppConfig = serde_json::from_str(MINIMAL)?;
        let err = config.collection("Collection 9").unwrap_err();
        assert_eq!(
            err.to_string(),
            "collection 'Collection 9' not found (available: Collection 2, Collection 1)"
        );
        Ok(())
    }

    #[test]
    fn load_reports_missing_and_malformed_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(
            AppConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("config.json");
        fs::write(&broken, "{ \"collections\": ")?;
        assert!(matches!(AppConfig::load(&broken), Err(ConfigError::Parse { .. })));

        fs::write(&broken, MINIMAL)?;
        assert_eq!(AppConfig::load(&broken)?.collections.len(), 2);
        Ok(())
    }
}
