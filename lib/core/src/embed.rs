//! Text embedding
//!
//! [`Embedder`] is the seam to the embedding model. [`HashingEmbedder`] is a
//! deterministic, model-free implementation based on character trigrams and
//! word hashing, used offline and in tests.

use crate::vector::Vector;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Default dimension for hashed text embeddings
pub const DEFAULT_HASH_DIM: usize = 256;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of the vectors this embedder produces
    fn dimension(&self) -> usize;

    /// Embed one text; identical input yields identical output.
    async fn embed(&self, text: &str) -> Result<Vector>;
}

/// Trigram and word hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    /// Synchronous embedding, usable where no runtime is available
    pub fn embed_text(&self, text: &str) -> Vector {
        Vector::new(hash_text_to_vector(text, self.dim))
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIM)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vector> {
        Ok(self.embed_text(text))
    }
}

/// Hash a string to a fixed-size unit vector.
///
/// Blank text yields the zero vector.
pub fn hash_text_to_vector(text: &str, dim: usize) -> Vec<f32> {
    if dim == 0 {
        return Vec::new();
    }
    let mut vector = vec![0.0f32; dim];
    let normalized = text.to_lowercase();

    for trigram in generate_trigrams(normalized.trim()) {
        vector[bucket(&trigram, dim)] += 1.0;
    }

    // Words contribute more than trigrams
    for word in normalized.split_whitespace() {
        vector[bucket(word, dim)] += 2.0;
    }

    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for v in &mut vector {
            *v /= magnitude;
        }
    }

    vector
}

fn bucket(token: &str, dim: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dim
}

fn generate_trigrams(s: &str) -> HashSet<String> {
    if s.is_empty() {
        return HashSet::new();
    }
    let padded = format!("  {}  ", s);
    let chars: Vec<char> = padded.chars().collect();

    chars.windows(3).map(|w| w.iter().collect::<String>()).collect()
}
