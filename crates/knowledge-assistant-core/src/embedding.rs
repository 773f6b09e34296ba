//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus the BLOB codec used to persist vectors.
//!
//! Concrete providers (OpenAI, Ollama) live in the `knowledge-assistant`
//! app crate.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Maps text to a fixed-length vector.
///
/// Every call within a deployment must return vectors of length
/// [`dims`](Embedder::dims).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Check a provider's output against the expected dimensionality and
/// reject NaN or infinite components.
pub fn validate_vector(vector: &[f32], expected_dims: usize) -> Result<(), EmbeddingError> {
    if vector.len() != expected_dims {
        return Err(EmbeddingError::UnexpectedDimensions {
            expected: expected_dims,
            actual: vector.len(),
        });
    }
    if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
        return Err(EmbeddingError::NonFiniteValue { index });
    }
    Ok(())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes, producing a BLOB of `vec.len() × 4`
/// bytes.
///
/// # Example
///
/// ```rust
/// use knowledge_assistant_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]. Trailing bytes that do not form a whole
/// `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_blob_ignores_partial_trailing_bytes() {
        let mut blob = vec_to_blob(&[2.0]);
        blob.push(0xff);
        assert_eq!(blob_to_vec(&blob), vec![2.0]);
    }

    #[test]
    fn test_validate_vector_dims() {
        assert!(validate_vector(&[1.0, 2.0], 2).is_ok());
        assert!(matches!(
            validate_vector(&[1.0], 2),
            Err(EmbeddingError::UnexpectedDimensions {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_validate_vector_non_finite() {
        assert!(matches!(
            validate_vector(&[1.0, f32::NAN, 0.0], 3),
            Err(EmbeddingError::NonFiniteValue { index: 1 })
        ));
        assert!(matches!(
            validate_vector(&[f32::INFINITY], 1),
            Err(EmbeddingError::NonFiniteValue { index: 0 })
        ));
    }
}
