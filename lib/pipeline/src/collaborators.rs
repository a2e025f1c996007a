//! Contracts for the external collaborators a pipeline run depends on.
//!
//! Every implementation must be safe to call from concurrent runs.

use anyhow::Result;
use async_trait::async_trait;
use receiptx_core::{CatalogProduct, DraftReceipt, RawLine};
use std::collections::BTreeSet;
use thiserror::Error;

/// Decoded image handed to the OCR engine
pub type Bitmap = image::RgbImage;

#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Decode raw upload bytes; malformed or unsupported input is an error.
    async fn decode(&self, bytes: &[u8]) -> Result<Bitmap>;
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// One string per recognized line, in reading order. May be empty.
    async fn extract(&self, bitmap: &Bitmap) -> Result<Vec<RawLine>>;
}

#[async_trait]
pub trait StructuredParser: Send + Sync {
    /// Best-effort draft built from OCR lines. Prices in the draft are not trusted.
    async fn parse(&self, lines: &[RawLine], known_product_names: &BTreeSet<String>) -> Result<DraftReceipt>;
}

/// Failure to read a user's catalog
#[derive(Error, Debug)]
pub enum CatalogFetchError {
    /// The store could not be reached; the run continues with an empty catalog
    #[error("product store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with data that cannot be used
    #[error("invalid catalog data: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list_products(&self, user_id: &str) -> std::result::Result<Vec<CatalogProduct>, CatalogFetchError>;
}
