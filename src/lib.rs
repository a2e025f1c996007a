//! # receiptx
//!
//! Receipt OCR reconciliation: a photographed receipt goes through OCR and
//! structured parsing, and every extracted line item is matched against the
//! user's product catalog by embedding similarity. Matched items are priced
//! from the catalog; unmatched ones are dropped; the total is recomputed.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! receiptx --catalog ./data/catalog.json --ocr-url http://localhost:8866/ocr --http-port 8080
//! curl -F user_id=user-1 -F image=@receipt.jpg http://localhost:8080/receipts
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use receiptx::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> receiptx::Result<()> {
//! let pipeline = ReceiptPipeline::builder()
//!     .image_loader(Arc::new(ImageCrateLoader::new()))
//!     .ocr(Arc::new(HttpOcrEngine::new("http://localhost:8866/ocr")))
//!     .parser(Arc::new(LlmStructuredParser::new("http://localhost:11434/v1", "llama3.1")))
//!     .embedder(Arc::new(HashingEmbedder::default()))
//!     .store(Arc::new(JsonFileProductStore::new("./data/catalog.json")))
//!     .build()?;
//!
//! let image = std::fs::read("receipt.jpg").unwrap_or_default();
//! let envelope = pipeline.process_receipt(&image, "user-1").await;
//! println!("{}", envelope.message);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - `receiptx-core` - similarity, catalog matching, reconciliation, data model
//! - `receiptx-pipeline` - orchestration, collaborator traits and clients
//! - `receiptx-api` - HTTP upload endpoint

// Re-export core types
pub use receiptx_core::{
    similarity, CatalogMatcher, CatalogProduct, DraftItem, DraftReceipt, DropReason, Embedder, Error,
    HashingEmbedder, LinearIndex, MatchResult, ProductIndex, Receipt, Reconciler, Reconciliation, Result,
    ValidatedItem, Vector, MATCH_THRESHOLD,
};

// Re-export pipeline
pub use receiptx_pipeline::{
    CatalogStatus, HttpEmbedder, HttpOcrEngine, ImageCrateLoader, InMemoryProductStore, JsonFileProductStore,
    LlmStructuredParser, PipelineConfig, ReceiptPipeline, ResultEnvelope, Status,
};

// Re-export API
pub use receiptx_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CatalogProduct, DraftItem, Embedder, Error, HashingEmbedder, HttpEmbedder, HttpOcrEngine,
        ImageCrateLoader, InMemoryProductStore, JsonFileProductStore, LlmStructuredParser, PipelineConfig,
        Receipt, ReceiptPipeline, Reconciler, RestApi, Result, ResultEnvelope, Vector,
    };
}
