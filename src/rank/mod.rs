//! Ranking heading candidates against a job query by embedding similarity.

pub mod e5;

pub use e5::E5Embedder;

use anyhow::Result;

use crate::core::model::{HeadingCandidate, RankedMatch};

/// Sentence-embedding capability.
pub trait Embedder {
    /// One vector per input text, in input order.
    fn embed(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub fn round_score(score: f32) -> f32 {
    (score * 1000.0).round() / 1000.0
}

pub struct SemanticRanker<E> {
    embedder: E,
    query: Option<(String, Vec<f32>)>,
}

impl<E: Embedder> SemanticRanker<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder, query: None }
    }

    /// The `k` candidates closest to `query`, best first. Equal scores keep
    /// candidate order.
    pub fn top_k(&mut self, candidates: Vec<HeadingCandidate>, query: &str, k: usize) -> Result<Vec<RankedMatch>> {
        if candidates.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.query_embedding(query)?;
        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed(&texts)?;
        if vectors.len() != candidates.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} candidates",
                vectors.len(),
                candidates.len()
            );
        }

        let mut scored: Vec<(f32, HeadingCandidate)> = vectors
            .iter()
            .map(|vector| cosine_similarity(&query_vec, vector))
            .zip(candidates)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, candidate)| RankedMatch {
                candidate,
                score: round_score(score),
            })
            .collect())
    }

    fn query_embedding(&mut self, query: &str) -> Result<Vec<f32>> {
        if let Some((cached, vector)) = &self.query {
            if cached == query {
                return Ok(vector.clone());
            }
        }
        let vector = self
            .embedder
            .embed(&[query])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for the query"))?;
        self.query = Some((query.to_string(), vector.clone()));
        Ok(vector)
    }
}
