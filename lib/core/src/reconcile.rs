//! Reconciliation of parsed draft items against a catalog snapshot
//!
//! Accepted items are rewritten with the catalog's id, name and price;
//! everything else is dropped with a diagnostic. Dropping is an expected
//! outcome, not an error: only an embedding collaborator failure aborts.

use crate::embed::Embedder;
use crate::matcher::{CatalogExclusion, CatalogMatcher, LinearIndex, MatchResult, ProductIndex};
use crate::receipt::{sum_totals, CatalogProduct, DraftItem, ValidatedItem};
use crate::vector::Vector;
use crate::{Error, Result};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Upper bound on a single line's quantity
pub const DEFAULT_MAX_QUANTITY: f64 = 1000.0;

/// Why a draft item did not make it into the receipt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    /// Quantity is not a finite number greater than zero
    InvalidQuantity,
    QuantityOutOfRange { max_quantity: f64 },
    /// Blank product name
    InvalidName,
    /// No catalog product reached the acceptance threshold
    BelowThreshold { best_similarity: Option<f32> },
    /// The item's embedding could not be scored against the catalog
    DegenerateEmbedding { detail: String },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::InvalidQuantity => write!(f, "quantity must be a positive number"),
            DropReason::QuantityOutOfRange { max_quantity } => {
                write!(f, "quantity exceeds the maximum of {}", max_quantity)
            }
            DropReason::InvalidName => write!(f, "blank product name"),
            DropReason::BelowThreshold { best_similarity: Some(s) } => {
                write!(f, "best catalog similarity {:.3} is below the threshold", s)
            }
            DropReason::BelowThreshold { best_similarity: None } => write!(f, "no catalog candidates"),
            DropReason::DegenerateEmbedding { detail } => write!(f, "unusable item embedding: {}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedItem {
    pub product_name: String,
    pub quantity: f64,
    pub reason: DropReason,
}

/// Output of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub items: Vec<ValidatedItem>,
    /// Sum of `items[*].total_price`
    pub total_price: f64,
    pub dropped: Vec<DroppedItem>,
}

/// Matches draft items against one catalog snapshot
#[derive(Debug, Clone)]
pub struct Reconciler<I = LinearIndex> {
    matcher: CatalogMatcher<I>,
    exclusions: Vec<CatalogExclusion>,
    max_quantity: f64,
}

impl Reconciler<LinearIndex> {
    pub fn from_catalog(catalog: &[CatalogProduct]) -> Self {
        Self::from_parts(CatalogMatcher::from_catalog(catalog))
    }

    /// Index `catalog` for items embedded by `embedder`; entries whose
    /// length differs from the embedder's output are excluded.
    pub fn for_embedder(catalog: &[CatalogProduct], embedder: &dyn Embedder) -> Self {
        Self::from_parts(CatalogMatcher::from_catalog_with_dim(catalog, embedder.dimension()))
    }

    fn from_parts((matcher, exclusions): (CatalogMatcher<LinearIndex>, Vec<CatalogExclusion>)) -> Self {
        Self {
            matcher,
            exclusions,
            max_quantity: DEFAULT_MAX_QUANTITY,
        }
    }
}

impl<I: ProductIndex> Reconciler<I> {
    pub fn with_index(index: I) -> Self {
        Self {
            matcher: CatalogMatcher::new(index),
            exclusions: Vec::new(),
            max_quantity: DEFAULT_MAX_QUANTITY,
        }
    }

    #[must_use]
    pub fn with_max_quantity(mut self, max_quantity: f64) -> Self {
        self.max_quantity = max_quantity;
        self
    }

    /// Catalog entries left out of matching when the snapshot was indexed
    pub fn exclusions(&self) -> &[CatalogExclusion] {
        &self.exclusions
    }

    /// Reject items that must not reach arithmetic or the embedder.
    pub fn validate_item<'a>(&self, item: &'a DraftItem) -> Result<&'a str> {
        let q = item.quantity;
        if !q.is_finite() || q <= 0.0 {
            return Err(Error::InvalidItem(DropReason::InvalidQuantity));
        }
        if q > self.max_quantity {
            return Err(Error::InvalidItem(DropReason::QuantityOutOfRange {
                max_quantity: self.max_quantity,
            }));
        }
        let name = item.product_name.trim();
        if name.is_empty() {
            return Err(Error::InvalidItem(DropReason::InvalidName));
        }
        Ok(name)
    }

    /// Reconcile draft items, preserving their order.
    ///
    /// Item names are embedded concurrently; matching runs in input order
    /// against this reconciler's snapshot.
    pub async fn reconcile(&self, draft_items: &[DraftItem], embedder: &dyn Embedder) -> Result<Reconciliation> {
        let mut dropped: Vec<(usize, DroppedItem)> = Vec::new();
        let mut valid: Vec<(usize, &DraftItem, &str)> = Vec::with_capacity(draft_items.len());

        for (pos, item) in draft_items.iter().enumerate() {
            match self.validate_item(item) {
                Ok(name) => valid.push((pos, item, name)),
                Err(Error::InvalidItem(reason)) => {
                    info!(
                        product_name = %item.product_name,
                        quantity = item.quantity,
                        %reason,
                        "Dropping invalid draft item"
                    );
                    dropped.push((pos, to_dropped(item, reason)));
                }
                Err(e) => return Err(e),
            }
        }

        let embeddings: Vec<Vector> = try_join_all(valid.iter().map(|(_, _, name)| embedder.embed(name)))
            .await
            .map_err(|e| Error::Embedding(format!("{:#}", e)))?;

        let mut items = Vec::with_capacity(valid.len());
        for ((pos, item, _), embedding) in valid.into_iter().zip(embeddings.iter()) {
            match self.matcher.match_embedding(embedding) {
                Ok(MatchResult::Accepted {
                    product,
                    price_per_unit,
                    similarity,
                }) => {
                    debug!(
                        product_name = %item.product_name,
                        product_id = %product.product_id,
                        similarity,
                        "Matched draft item"
                    );
                    items.push(ValidatedItem::from_match(product, price_per_unit, item.quantity));
                }
                Ok(MatchResult::Rejected { best_similarity }) => {
                    info!(
                        product_name = %item.product_name,
                        quantity = item.quantity,
                        ?best_similarity,
                        "No catalog match for draft item"
                    );
                    dropped.push((pos, to_dropped(item, DropReason::BelowThreshold { best_similarity })));
                }
                Err(e @ Error::Computation(_)) => {
                    info!(
                        product_name = %item.product_name,
                        error = %e,
                        "Dropping draft item with unusable embedding"
                    );
                    dropped.push((pos, to_dropped(item, DropReason::DegenerateEmbedding { detail: e.to_string() })));
                }
                Err(e) => return Err(e),
            }
        }

        dropped.sort_by_key(|(pos, _)| *pos);
        let total_price = sum_totals(&items);
        info!(
            accepted = items.len(),
            dropped = dropped.len(),
            total_price,
            "Reconciliation finished"
        );

        Ok(Reconciliation {
            items,
            total_price,
            dropped: dropped.into_iter().map(|(_, d)| d).collect(),
        })
    }
}

fn to_dropped(item: &DraftItem, reason: DropReason) -> DroppedItem {
    DroppedItem {
        product_name: item.product_name.clone(),
        quantity: item.quantity,
        reason,
    }
}
