//! # receiptx Pipeline
//!
//! Orchestrates a receipt run over injected collaborators:
//!
//! ```text
//! image bytes -> ImageLoader -> OcrEngine -> ProductStore (snapshot)
//!             -> StructuredParser -> timestamp -> Reconciler -> Receipt
//! ```
//!
//! Concrete collaborators for production use live next to the traits:
//! [`ImageCrateLoader`], [`HttpOcrEngine`], [`LlmStructuredParser`],
//! [`HttpEmbedder`], [`InMemoryProductStore`] and [`JsonFileProductStore`].

pub mod collaborators;
pub mod config;
pub mod envelope;
pub mod timestamp;
pub mod orchestrator;
pub mod image_loader;
pub mod ocr;
pub mod parser;
pub mod embedder;
pub mod store;

pub use collaborators::{Bitmap, CatalogFetchError, ImageLoader, OcrEngine, ProductStore, StructuredParser};
pub use config::{PipelineConfig, DEFAULT_TIMEOUT};
pub use envelope::{ResultEnvelope, Status, FAILURE_MESSAGE, SUCCESS_MESSAGE};
pub use timestamp::{is_iso8601, normalize_timestamp};
pub use orchestrator::{CatalogStatus, ReceiptPipeline, ReceiptPipelineBuilder, RunReport};
pub use image_loader::{encode_png, ImageCrateLoader};
pub use ocr::HttpOcrEngine;
pub use parser::LlmStructuredParser;
pub use embedder::HttpEmbedder;
pub use store::{InMemoryProductStore, JsonFileProductStore};
