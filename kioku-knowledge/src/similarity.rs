//! Cosine similarity between embeddings.

use crate::errors::{KnowledgeError, KnowledgeResult};

/// Cosine similarity of two equal-length vectors, in `[-1, 1]`.
///
/// A zero-magnitude operand scores exactly `0.0`. Vectors of different
/// lengths are rejected with `DimensionMismatch`; they are never padded or
/// truncated.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> KnowledgeResult<f32> {
    if a.len() != b.len() {
        return Err(KnowledgeError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(score.clamp(-1.0, 1.0) as f32)
}
