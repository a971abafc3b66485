//! A deterministic fake oracle used by every test in this crate.

use sha2::{Digest, Sha256};

use crate::error::Result;

use super::{normalize, Oracle};

/// Deterministic, hash-seeded embeddings and templated chat replies.
///
/// Embeddings are reproducible across runs: the same text always maps to
/// the same vector, which lets index and retrieval tests assert exact
/// top-K ordering without a real model.
pub struct FakeOracle {
    dimensions: usize,
}

impl FakeOracle {
    /// Creates a fake oracle producing vectors of `dimensions` length.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for FakeOracle {
    fn default() -> Self {
        Self::new(32)
    }
}

impl Oracle for FakeOracle {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = Vec::with_capacity(self.dimensions);
        let mut seed = Sha256::digest(text.as_bytes()).to_vec();
        while vector.len() < self.dimensions {
            seed = Sha256::digest(&seed).to_vec();
            for chunk in seed.chunks_exact(4) {
                if vector.len() >= self.dimensions {
                    break;
                }
                #[allow(clippy::cast_precision_loss)]
                let value = (u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
                    as f32
                    / f32::from(u16::MAX))
                    - 1.0;
                vector.push(value);
            }
        }
        normalize(&mut vector);
        Ok(vector)
    }

    fn chat(&self, prompt: &str) -> Result<String> {
        Ok(format!(
            "{{\"summary\":\"fake summary for prompt of {} chars\",\"decisions\":[],\"constraints\":[],\"active_tasks\":[],\"recent_topics\":[]}}",
            prompt.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_is_deterministic() {
        let oracle = FakeOracle::new(16);
        let a = oracle.embed("hello").unwrap();
        let b = oracle.embed("hello").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn embed_differs_for_different_text() {
        let oracle = FakeOracle::new(16);
        let a = oracle.embed("alpha").unwrap();
        let b = oracle.embed("beta").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn embed_has_requested_dimension() {
        let oracle = FakeOracle::new(384);
        let v = oracle.embed("text").unwrap();
        assert_eq!(v.len(), 384);
    }

    #[test]
    fn embed_is_unit_normalized() {
        let oracle = FakeOracle::new(8);
        let v = oracle.embed("text").unwrap();
        let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 1e-4);
    }

    #[test]
    fn chat_returns_parseable_json() {
        let oracle = FakeOracle::new(8);
        let reply = oracle.chat("summarize this").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert!(parsed.get("summary").is_some());
    }
}
