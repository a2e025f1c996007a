//! Receipt pipeline orchestration
//!
//! A run moves strictly forward: load, extract, fetch catalog, parse,
//! normalize timestamp, reconcile, assemble. Any stage error aborts the
//! run; [`ReceiptPipeline::process_receipt`] turns it into the generic
//! failure envelope after logging the details.

use crate::collaborators::{CatalogFetchError, ImageLoader, OcrEngine, ProductStore, StructuredParser};
use crate::config::PipelineConfig;
use crate::envelope::ResultEnvelope;
use crate::timestamp::normalize_timestamp;
use chrono::Utc;
use receiptx_core::{
    CatalogExclusion, CatalogProduct, DroppedItem, Embedder, Error, Receipt, Reconciler, Result,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How the catalog fetch went, kept apart for diagnostics even though
/// both empty outcomes give the reconciler an empty catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CatalogStatus {
    Loaded { products: usize },
    /// The store answered and the user has no products
    Empty,
    /// The store could not be reached
    Unavailable,
}

/// Everything a successful run produced, including diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub receipt: Receipt,
    pub catalog: CatalogStatus,
    pub dropped: Vec<DroppedItem>,
    pub exclusions: Vec<CatalogExclusion>,
}

/// The receipt pipeline with its injected collaborators
pub struct ReceiptPipeline {
    image_loader: Arc<dyn ImageLoader>,
    ocr: Arc<dyn OcrEngine>,
    parser: Arc<dyn StructuredParser>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ProductStore>,
    config: PipelineConfig,
}

impl ReceiptPipeline {
    pub fn builder() -> ReceiptPipelineBuilder {
        ReceiptPipelineBuilder::default()
    }

    /// Process one receipt image for `user_id`.
    ///
    /// Never fails: errors and timeouts become the failure envelope.
    pub async fn process_receipt(&self, image_bytes: &[u8], user_id: &str) -> ResultEnvelope {
        let run_id = Uuid::new_v4();
        let span = info_span!("receipt_run", %run_id, user_id);

        async move {
            info!(bytes = image_bytes.len(), "Starting receipt processing");
            let outcome = match tokio::time::timeout(self.config.timeout, self.run(image_bytes, user_id)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(self.config.timeout)),
            };

            match outcome {
                Ok(report) => {
                    info!(
                        items = report.receipt.items.len(),
                        dropped = report.dropped.len(),
                        total_price = report.receipt.total_price,
                        "Receipt processed successfully"
                    );
                    ResultEnvelope::success(report.receipt)
                }
                Err(e) => {
                    error!(kind = e.kind(), error = %e, "Error processing receipt");
                    ResultEnvelope::failed()
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run every stage and return the typed outcome.
    ///
    /// Not bounded by the configured timeout; use
    /// [`process_receipt`](Self::process_receipt) for the caller contract.
    pub async fn run(&self, image_bytes: &[u8], user_id: &str) -> Result<RunReport> {
        if image_bytes.is_empty() {
            return Err(Error::ImageDecode("empty upload".to_string()));
        }

        debug!(stage = "load", "Decoding image");
        let bitmap = self
            .image_loader
            .decode(image_bytes)
            .await
            .map_err(|e| Error::ImageDecode(format!("{:#}", e)))?;

        debug!(stage = "extract", "Running OCR");
        let lines = self
            .ocr
            .extract(&bitmap)
            .await
            .map_err(|e| Error::Ocr(format!("{:#}", e)))?;
        info!(stage = "extract", lines = lines.len(), "OCR text extracted");

        // One snapshot per run: parse and reconcile both use it.
        let (catalog, catalog_status) = self.fetch_catalog(user_id).await?;
        let known_names: BTreeSet<String> = catalog.iter().map(|p| p.product_name.clone()).collect();

        debug!(stage = "parse", "Parsing OCR lines");
        let draft = self
            .parser
            .parse(&lines, &known_names)
            .await
            .map_err(|e| Error::Parse(format!("{:#}", e)))?;
        info!(
            stage = "parse",
            items = draft.items.len(),
            draft_total = ?draft.total_price,
            "Draft receipt parsed"
        );

        let timestamp = normalize_timestamp(draft.timestamp.as_deref(), Utc::now());
        if draft.timestamp.as_deref().map(str::trim) != Some(timestamp.as_str()) {
            debug!(stage = "normalize", raw = ?draft.timestamp, %timestamp, "Substituted processing time");
        }

        let reconciler =
            Reconciler::for_embedder(&catalog, self.embedder.as_ref()).with_max_quantity(self.config.max_quantity);
        let reconciliation = reconciler.reconcile(&draft.items, self.embedder.as_ref()).await?;

        let receipt = Receipt::assemble(user_id, timestamp, reconciliation.items);
        Ok(RunReport {
            receipt,
            catalog: catalog_status,
            dropped: reconciliation.dropped,
            exclusions: reconciler.exclusions().to_vec(),
        })
    }

    async fn fetch_catalog(&self, user_id: &str) -> Result<(Vec<CatalogProduct>, CatalogStatus)> {
        match self.store.list_products(user_id).await {
            Ok(products) if products.is_empty() => {
                info!(stage = "fetch_catalog", "User has no catalog products");
                Ok((products, CatalogStatus::Empty))
            }
            Ok(products) => {
                info!(stage = "fetch_catalog", products = products.len(), "Catalog fetched");
                let status = CatalogStatus::Loaded {
                    products: products.len(),
                };
                Ok((products, status))
            }
            Err(CatalogFetchError::Unavailable(reason)) => {
                warn!(stage = "fetch_catalog", %reason, "Product store unavailable, continuing with empty catalog");
                Ok((Vec::new(), CatalogStatus::Unavailable))
            }
            Err(e @ CatalogFetchError::Invalid(_)) => Err(Error::CatalogFetch(e.to_string())),
        }
    }
}

/// Builder for [`ReceiptPipeline`]; every collaborator is required
#[derive(Default)]
pub struct ReceiptPipelineBuilder {
    image_loader: Option<Arc<dyn ImageLoader>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    parser: Option<Arc<dyn StructuredParser>>,
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn ProductStore>>,
    config: PipelineConfig,
}

impl ReceiptPipelineBuilder {
    pub fn image_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.image_loader = Some(loader);
        self
    }

    pub fn ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn StructuredParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn store(mut self, store: Arc<dyn ProductStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ReceiptPipeline> {
        self.config.validate()?;
        Ok(ReceiptPipeline {
            image_loader: self.image_loader.ok_or_else(|| missing("image loader"))?,
            ocr: self.ocr.ok_or_else(|| missing("OCR engine"))?,
            parser: self.parser.ok_or_else(|| missing("structured parser"))?,
            embedder: self.embedder.ok_or_else(|| missing("embedder"))?,
            store: self.store.ok_or_else(|| missing("product store"))?,
            config: self.config,
        })
    }
}

fn missing(what: &str) -> Error {
    Error::InvalidConfig(format!("no {} configured", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Bitmap;
    use crate::store::InMemoryProductStore;
    use async_trait::async_trait;
    use receiptx_core::{DraftItem, DraftReceipt, HashingEmbedder, RawLine};

    struct BlankLoader;

    #[async_trait]
    impl ImageLoader for BlankLoader {
        async fn decode(&self, _bytes: &[u8]) -> anyhow::Result<Bitmap> {
            Ok(Bitmap::new(1, 1))
        }
    }

    struct NoLines;

    #[async_trait]
    impl OcrEngine for NoLines {
        async fn extract(&self, _bitmap: &Bitmap) -> anyhow::Result<Vec<RawLine>> {
            Ok(Vec::new())
        }
    }

    struct EchoNames;

    #[async_trait]
    impl StructuredParser for EchoNames {
        async fn parse(&self, _lines: &[RawLine], known: &BTreeSet<String>) -> anyhow::Result<DraftReceipt> {
            Ok(DraftReceipt {
                items: known.iter().map(|n| DraftItem::new(n.clone(), 1.0)).collect(),
                ..Default::default()
            })
        }
    }

    fn pipeline(store: InMemoryProductStore) -> ReceiptPipeline {
        ReceiptPipeline::builder()
            .image_loader(Arc::new(BlankLoader))
            .ocr(Arc::new(NoLines))
            .parser(Arc::new(EchoNames))
            .embedder(Arc::new(HashingEmbedder::default()))
            .store(Arc::new(store))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let result = ReceiptPipeline::builder().build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_known_names_come_from_catalog_snapshot() {
        let embedder = HashingEmbedder::default();
        let store = InMemoryProductStore::new();
        store.set_catalog(
            "u1",
            vec![
                CatalogProduct::new("p1", "Es Teh Manis", 10000.0, embedder.embed_text("Es Teh Manis")),
                CatalogProduct::new("p2", "Ayam Bakar", 45000.0, embedder.embed_text("Ayam Bakar")),
            ],
        );

        let report = pipeline(store).run(b"img", "u1").await.unwrap();
        assert_eq!(report.catalog, CatalogStatus::Loaded { products: 2 });
        // BTreeSet order: "Ayam Bakar" before "Es Teh Manis"
        let ids: Vec<_> = report.receipt.items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
        assert_eq!(report.receipt.total_price, 55000.0);
    }

    #[tokio::test]
    async fn test_empty_upload_is_decode_error() {
        let result = pipeline(InMemoryProductStore::new()).run(b"", "u1").await;
        assert!(matches!(result, Err(Error::ImageDecode(_))));
    }

    #[tokio::test]
    async fn test_user_without_products() {
        let report = pipeline(InMemoryProductStore::new()).run(b"img", "u1").await.unwrap();
        assert_eq!(report.catalog, CatalogStatus::Empty);
        assert!(report.receipt.items.is_empty());
    }
}
