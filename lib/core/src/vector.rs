use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// An embedding vector
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Euclidean norm, accumulated in f64
    #[inline]
    pub fn norm(&self) -> f64 {
        self.data
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt()
    }

    #[inline]
    pub fn dot(&self, other: &Vector) -> f64 {
        // Two accumulators for better pipelining
        let mut sum1 = 0.0f64;
        let mut sum2 = 0.0f64;
        let mut pairs = self.data.chunks_exact(2).zip(other.data.chunks_exact(2));
        for (a, b) in pairs.by_ref() {
            sum1 += f64::from(a[0]) * f64::from(b[0]);
            sum2 += f64::from(a[1]) * f64::from(b[1]);
        }
        if self.data.len() % 2 == 1 && other.data.len() == self.data.len() {
            let last = self.data.len() - 1;
            sum1 += f64::from(self.data[last]) * f64::from(other.data[last]);
        }
        sum1 + sum2
    }

    /// Cosine similarity with another vector.
    ///
    /// Returns [`Error::Computation`] when the dimensions differ or either
    /// vector has a zero (or non-finite) norm, instead of producing NaN.
    #[inline]
    pub fn cosine_similarity(&self, other: &Vector) -> Result<f32> {
        if self.dim() != other.dim() {
            return Err(Error::Computation(format!(
                "dimension mismatch: {} vs {}",
                self.dim(),
                other.dim()
            )));
        }
        if self.is_empty() {
            return Err(Error::Computation("empty vector".to_string()));
        }

        let norm_a = self.norm();
        let norm_b = other.norm();
        if !is_usable_norm(norm_a) || !is_usable_norm(norm_b) {
            return Err(Error::Computation("zero-norm vector".to_string()));
        }

        Ok(cosine_with_norms(self, other, norm_a, norm_b))
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

/// Cosine similarity of two equal-length, non-zero vectors.
pub fn similarity(a: &Vector, b: &Vector) -> Result<f32> {
    a.cosine_similarity(b)
}

#[inline]
pub(crate) fn is_usable_norm(norm: f64) -> bool {
    norm.is_finite() && norm > 0.0
}

/// Cosine similarity when both norms are already known to be usable.
#[inline]
pub(crate) fn cosine_with_norms(a: &Vector, b: &Vector, norm_a: f64, norm_b: f64) -> f32 {
    let cos = a.dot(b) / (norm_a * norm_b);
    cos.clamp(-1.0, 1.0) as f32
}
