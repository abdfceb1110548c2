use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::api::sync::ApiBuilder;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::rank::Embedder;

pub const DEFAULT_MODEL_ID: &str = "intfloat/e5-small-v2";

const MAX_SEQ_LEN: usize = 512;

/// BERT sentence encoder: mean-pooled last hidden state, L2 normalised.
pub struct E5Embedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl E5Embedder {
    /// Load from `model_dir` when given, otherwise fetch `model_id` from the
    /// Hugging Face hub (optionally into `cache_dir`).
    pub fn load(model_id: &str, model_dir: Option<&Path>, cache_dir: Option<&Path>) -> Result<Self> {
        let device = Device::Cpu;
        if let Some(dir) = model_dir {
            tracing::info!(dir = %dir.display(), "loading embedding model from local directory");
            return Self::from_files(
                &dir.join("config.json"),
                &dir.join("tokenizer.json"),
                &dir.join("model.safetensors"),
                &device,
            );
        }
        Self::from_hub(model_id, cache_dir, &device)
    }

    fn from_hub(model_id: &str, cache_dir: Option<&Path>, device: &Device) -> Result<Self> {
        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(cache_dir) = cache_dir {
            builder = builder.with_cache_dir(PathBuf::from(cache_dir));
        }
        let api = builder.build().context("failed to create Hugging Face API client")?;
        let repo = api.model(model_id.to_string());

        tracing::info!(model = model_id, "fetching embedding model");
        let config_path = repo.get("config.json").context("failed to get config.json")?;
        let tokenizer_path = repo.get("tokenizer.json").context("failed to get tokenizer.json")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("failed to get model.safetensors")?;

        Self::from_files(&config_path, &tokenizer_path, &weights_path, device)
    }

    pub fn from_files(config_path: &Path, tokenizer_path: &Path, weights_path: &Path, device: &Device) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer {}: {e}", tokenizer_path.display()))?;

        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&config_str).context("failed to parse BERT config")?;

        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .with_context(|| format!("failed to map {}", weights_path.display()))?
        };
        let model = BertModel::load(vb.clone(), &config)
            .or_else(|_| BertModel::load(vb.pp("bert"), &config))
            .context("failed to load BERT weights")?;

        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
        })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        let mut ids: Vec<u32> = encoding.get_ids().to_vec();
        ids.truncate(MAX_SEQ_LEN);
        let seq_len = ids.len();

        let input_ids = Tensor::new(&ids[..], &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::zeros((1, seq_len), DType::U32, &self.device)?;
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, None)
            .context("embedding forward pass failed")?;

        // [1, seq, dim] -> [dim]
        let pooled = hidden.mean(1)?.squeeze(0)?;
        let norm = pooled.sqr()?.sum_all()?.sqrt()?;
        let normalized = pooled.broadcast_div(&norm)?;
        Ok(normalized.to_vec1::<f32>()?)
    }
}

impl Embedder for E5Embedder {
    fn embed(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed_one(text)).collect()
    }
}
