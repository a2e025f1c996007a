//! # receiptx Core
//!
//! Receipt reconciliation: matching OCR-derived line items against a user's
//! product catalog by embedding similarity.
//!
//! - [`Vector`] - embedding vector with cosine similarity
//! - [`CatalogMatcher`] - best catalog match with a fixed acceptance threshold
//! - [`Reconciler`] - turns draft items into validated, catalog-priced items
//! - [`Receipt`] - the final record, whose total is always recomputed
//!
//! ## Example
//!
//! ```rust
//! use receiptx_core::{CatalogProduct, DraftItem, HashingEmbedder, Reconciler};
//!
//! let embedder = HashingEmbedder::default();
//! let catalog = vec![CatalogProduct::new(
//!     "prod_001",
//!     "Nasi Goreng Spesial",
//!     25000.0,
//!     embedder.embed_text("Nasi Goreng Spesial"),
//! )];
//! let reconciler = Reconciler::from_catalog(&catalog);
//! let items = vec![DraftItem::new("Nasi Goreng", 2.0)];
//! let item = &items[0];
//! assert!(reconciler.validate_item(item).is_ok());
//! ```

pub mod error;
pub mod vector;
pub mod receipt;
pub mod embed;
pub mod matcher;
pub mod reconcile;

pub use error::{Error, Result};
pub use vector::{similarity, Vector};
pub use receipt::{CatalogProduct, DraftItem, DraftReceipt, RawLine, Receipt, ValidatedItem};
pub use embed::{Embedder, HashingEmbedder, DEFAULT_HASH_DIM};
pub use matcher::{
    CatalogExclusion, CatalogMatcher, ExclusionReason, LinearIndex, MatchResult, Neighbor, ProductIndex,
    MATCH_THRESHOLD,
};
pub use reconcile::{DropReason, DroppedItem, Reconciler, Reconciliation, DEFAULT_MAX_QUANTITY};
