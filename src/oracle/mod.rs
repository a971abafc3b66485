//! The oracle capability: embedding and chat, treated as an external
//! collaborator passed by the caller.
//!
//! Production code talks to the oracle only through the [`Oracle`] trait;
//! tests substitute [`fake::FakeOracle`]. No side-channel access.

pub mod fake;
#[cfg(feature = "ollama")]
pub mod ollama;

use crate::error::Result;

/// A two-method capability: text-to-vector embedding, and free-form chat
/// completion.
///
/// Implementations are `Send + Sync` so a single oracle handle can be
/// shared across the worker threads used for batch embedding and
/// parallel search.
pub trait Oracle: Send + Sync {
    /// The fixed dimension of vectors this oracle returns.
    fn dimensions(&self) -> usize;

    /// Embeds one piece of text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::OracleError`] variants for unreachable
    /// service, missing model, or timeout.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch of texts. The default implementation calls
    /// [`Oracle::embed`] once per item; implementations with a real batch
    /// endpoint should override this.
    ///
    /// # Errors
    ///
    /// Returns the first embedding failure encountered.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Issues a chat completion request, returning the response text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::OracleError`] variants for unreachable
    /// service, missing model, or timeout.
    fn chat(&self, prompt: &str) -> Result<String>;
}

/// Computes cosine similarity between two equal-length vectors.
///
/// Returns `0.0` for mismatched lengths or a zero-magnitude vector,
/// matching the fallback behavior of a flat dot-product scan that must
/// never panic on degenerate input.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Normalizes a vector to unit length in place. No-op on a zero vector.
pub fn normalize(v: &mut [f32]) {
    let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag > 0.0 {
        for x in v.iter_mut() {
            *x /= mag;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector_is_noop() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
