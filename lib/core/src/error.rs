use crate::reconcile::DropReason;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Catalog fetch error: {0}")]
    CatalogFetch(String),

    #[error("Invalid item: {0}")]
    InvalidItem(DropReason),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Pipeline timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Stable tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ImageDecode(_) => "image_decode",
            Error::Ocr(_) => "ocr",
            Error::Parse(_) => "parse",
            Error::CatalogFetch(_) => "catalog_fetch",
            Error::InvalidItem(_) => "invalid_item",
            Error::Computation(_) => "computation",
            Error::Embedding(_) => "embedding",
            Error::Timeout(_) => "timeout",
            Error::InvalidConfig(_) => "invalid_config",
        }
    }
}
