//! Nearest-neighbor matching of item embeddings against a user's catalog.
//!
//! [`LinearIndex`] is an exhaustive scan over a validated catalog snapshot.
//! Per-user catalogs are small (tens to low hundreds of products), so no
//! graph index is built; a different [`ProductIndex`] can be plugged into
//! [`CatalogMatcher`] without touching its callers.

use crate::receipt::CatalogProduct;
use crate::vector::{cosine_with_norms, is_usable_norm, Vector};
use crate::{Error, Result};
use serde::Serialize;
use tracing::warn;

/// Minimum cosine similarity for a catalog match to be accepted
pub const MATCH_THRESHOLD: f32 = 0.5;

/// Closest catalog entry for a query embedding
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub product: &'a CatalogProduct,
    pub price_per_unit: f64,
    pub similarity: f32,
}

/// Nearest-neighbor lookup over one catalog snapshot
pub trait ProductIndex: Send + Sync {
    /// Number of usable candidates
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best candidate for `query`, or `None` when there are no candidates.
    ///
    /// Ties must resolve to the candidate that appeared first in the catalog.
    fn nearest(&self, query: &Vector) -> Result<Option<Neighbor<'_>>>;
}

/// Why a catalog entry was left out of matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    MissingPrice,
    MissingEmbedding,
    DegenerateEmbedding,
    DimensionMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogExclusion {
    pub product_id: String,
    pub product_name: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone)]
struct Candidate {
    product: CatalogProduct,
    price: f64,
    norm: f64,
}

/// Exhaustive linear scan over a catalog snapshot
#[derive(Debug, Clone, Default)]
pub struct LinearIndex {
    candidates: Vec<Candidate>,
    dim: Option<usize>,
}

impl LinearIndex {
    /// Validate a catalog snapshot and index its usable entries.
    ///
    /// The embedding dimension is the one most usable entries share (the
    /// earliest wins a tie); entries of any other length are excluded.
    pub fn build(catalog: &[CatalogProduct]) -> (Self, Vec<CatalogExclusion>) {
        Self::build_with_dim(catalog, None)
    }

    /// Like [`build`](Self::build), but entries must have `expected_dim`
    /// components, usually the embedder's output dimension.
    pub fn build_with_dim(catalog: &[CatalogProduct], expected_dim: Option<usize>) -> (Self, Vec<CatalogExclusion>) {
        let dim = expected_dim.filter(|&d| d > 0).or_else(|| Self::dominant_dim(catalog));
        let mut candidates = Vec::with_capacity(catalog.len());
        let mut exclusions = Vec::new();

        for product in catalog {
            match Self::check(product, dim) {
                Ok((price, norm)) => candidates.push(Candidate {
                    product: product.clone(),
                    price,
                    norm,
                }),
                Err(reason) => {
                    warn!(
                        product_id = %product.product_id,
                        product_name = %product.product_name,
                        ?reason,
                        "Excluding catalog product from matching"
                    );
                    exclusions.push(CatalogExclusion {
                        product_id: product.product_id.clone(),
                        product_name: product.product_name.clone(),
                        reason,
                    });
                }
            }
        }

        (Self { candidates, dim }, exclusions)
    }

    fn dominant_dim(catalog: &[CatalogProduct]) -> Option<usize> {
        let mut counts: Vec<(usize, usize)> = Vec::new();
        for product in catalog.iter().filter(|p| Self::check(p, None).is_ok()) {
            let d = product.embedding.dim();
            match counts.iter_mut().find(|(dim, _)| *dim == d) {
                Some((_, n)) => *n += 1,
                None => counts.push((d, 1)),
            }
        }

        let mut best: Option<(usize, usize)> = None;
        for (d, n) in counts {
            if best.map_or(true, |(_, best_n)| n > best_n) {
                best = Some((d, n));
            }
        }
        best.map(|(d, _)| d)
    }

    fn check(product: &CatalogProduct, dim: Option<usize>) -> std::result::Result<(f64, f64), ExclusionReason> {
        let price = match product.price {
            Some(p) if p.is_finite() && p >= 0.0 => p,
            _ => return Err(ExclusionReason::MissingPrice),
        };
        if product.embedding.is_empty() {
            return Err(ExclusionReason::MissingEmbedding);
        }
        let norm = product.embedding.norm();
        if !is_usable_norm(norm) {
            return Err(ExclusionReason::DegenerateEmbedding);
        }
        if dim.is_some_and(|d| d != product.embedding.dim()) {
            return Err(ExclusionReason::DimensionMismatch);
        }
        Ok((price, norm))
    }

    /// Embedding dimension candidates were validated against
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }
}

impl ProductIndex for LinearIndex {
    fn len(&self) -> usize {
        self.candidates.len()
    }

    fn nearest(&self, query: &Vector) -> Result<Option<Neighbor<'_>>> {
        let query_norm = query.norm();
        if query.is_empty() || !is_usable_norm(query_norm) {
            return Err(Error::Computation("zero-norm query embedding".to_string()));
        }
        let dim = match self.dim {
            Some(d) => d,
            None => return Ok(None),
        };
        if query.dim() != dim {
            return Err(Error::Computation(format!(
                "query dimension {} does not match catalog dimension {}",
                query.dim(),
                dim
            )));
        }

        let mut best: Option<Neighbor<'_>> = None;
        for candidate in &self.candidates {
            let similarity = cosine_with_norms(query, &candidate.product.embedding, query_norm, candidate.norm);
            // Strictly greater keeps the earliest candidate on ties
            if best.map_or(true, |b| similarity > b.similarity) {
                best = Some(Neighbor {
                    product: &candidate.product,
                    price_per_unit: candidate.price,
                    similarity,
                });
            }
        }
        Ok(best)
    }
}

/// Outcome of matching one item embedding
#[derive(Debug, Clone, Copy)]
pub enum MatchResult<'a> {
    Accepted {
        product: &'a CatalogProduct,
        price_per_unit: f64,
        similarity: f32,
    },
    Rejected {
        /// `None` when the catalog had no usable candidate
        best_similarity: Option<f32>,
    },
}

impl MatchResult<'_> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MatchResult::Accepted { .. })
    }
}

/// Applies the acceptance threshold on top of a [`ProductIndex`]
#[derive(Debug, Clone)]
pub struct CatalogMatcher<I = LinearIndex> {
    index: I,
}

impl CatalogMatcher<LinearIndex> {
    /// Build a linear-scan matcher over a catalog snapshot.
    pub fn from_catalog(catalog: &[CatalogProduct]) -> (Self, Vec<CatalogExclusion>) {
        let (index, exclusions) = LinearIndex::build(catalog);
        (Self::new(index), exclusions)
    }

    /// Build a linear-scan matcher whose entries must have `dim` components.
    pub fn from_catalog_with_dim(catalog: &[CatalogProduct], dim: usize) -> (Self, Vec<CatalogExclusion>) {
        let (index, exclusions) = LinearIndex::build_with_dim(catalog, Some(dim));
        (Self::new(index), exclusions)
    }
}

impl<I: ProductIndex> CatalogMatcher<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    pub fn match_embedding(&self, embedding: &Vector) -> Result<MatchResult<'_>> {
        let result = match self.index.nearest(embedding)? {
            Some(n) if n.similarity >= MATCH_THRESHOLD => MatchResult::Accepted {
                product: n.product,
                price_per_unit: n.price_per_unit,
                similarity: n.similarity,
            },
            Some(n) => MatchResult::Rejected {
                best_similarity: Some(n.similarity),
            },
            None => MatchResult::Rejected {
                best_similarity: None,
            },
        };
        Ok(result)
    }
}
