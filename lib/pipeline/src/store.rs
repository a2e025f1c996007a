//! Product catalog read path

use crate::collaborators::{CatalogFetchError, ProductStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use receiptx_core::CatalogProduct;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Catalogs held in memory, keyed by user id
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductStore {
    catalogs: Arc<RwLock<HashMap<String, Vec<CatalogProduct>>>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a user's catalog
    pub fn set_catalog(&self, user_id: impl Into<String>, products: Vec<CatalogProduct>) {
        self.catalogs.write().insert(user_id.into(), products);
    }

    /// Append one product to a user's catalog
    pub fn add_product(&self, user_id: &str, product: CatalogProduct) {
        self.catalogs
            .write()
            .entry(user_id.to_string())
            .or_default()
            .push(product);
    }

    pub fn user_count(&self) -> usize {
        self.catalogs.read().len()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn list_products(&self, user_id: &str) -> Result<Vec<CatalogProduct>, CatalogFetchError> {
        Ok(self.catalogs.read().get(user_id).cloned().unwrap_or_default())
    }
}

/// Catalogs read from a JSON file shaped `{"<user_id>": [product, ..]}`.
///
/// The file is read on every call, so edits show up on the next run.
#[derive(Debug, Clone)]
pub struct JsonFileProductStore {
    path: PathBuf,
}

impl JsonFileProductStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProductStore for JsonFileProductStore {
    async fn list_products(&self, user_id: &str) -> Result<Vec<CatalogProduct>, CatalogFetchError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CatalogFetchError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        let mut catalogs: HashMap<String, Vec<CatalogProduct>> =
            serde_json::from_slice(&bytes).map_err(|e| CatalogFetchError::Invalid(e.to_string()))?;
        let products = catalogs.remove(user_id).unwrap_or_default();
        debug!(path = %self.path.display(), user_id, products = products.len(), "Catalog loaded");
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use receiptx_core::Vector;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryProductStore::new();
        store.add_product("u1", CatalogProduct::new("p1", "Es Teh", 10000.0, Vector::new(vec![1.0])));
        store.add_product("u1", CatalogProduct::new("p2", "Kopi", 12000.0, Vector::new(vec![0.5])));

        let products = store.list_products("u1").await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[1].product_id, "p2");
        assert!(store.list_products("nobody").await.unwrap().is_empty());

        store.set_catalog("u1", Vec::new());
        assert!(store.list_products("u1").await.unwrap().is_empty());
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_json_file_store() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"u1": [{{"product_id": "p1", "product_name": "Ayam Bakar", "price": 45000, "embedding": [0.1, 0.9]}}]}}"#
        )
        .unwrap();

        let store = JsonFileProductStore::new(file.path());
        let products = store.list_products("u1").await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price, Some(45000.0));
        assert_eq!(products[0].embedding.as_slice(), &[0.1, 0.9]);
        assert!(store.list_products("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileProductStore::new(dir.path().join("missing.json"));
        let result = store.list_products("u1").await;
        assert!(matches!(result, Err(CatalogFetchError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_malformed_file_is_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[not a catalog").unwrap();
        let store = JsonFileProductStore::new(file.path());
        let result = store.list_products("u1").await;
        assert!(matches!(result, Err(CatalogFetchError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_entry_without_embedding_keeps_the_catalog() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"u1": [
                {{"product_id": "p1", "product_name": "Ayam Bakar", "price": 45000, "embedding": [0.1, 0.9]}},
                {{"product_id": "p2", "product_name": "Es Jeruk", "price": "12000", "embedding": null}}
            ]}}"#
        )
        .unwrap();

        let store = JsonFileProductStore::new(file.path());
        let products = store.list_products("u1").await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[1].price, Some(12000.0));
        assert!(products[1].embedding.is_empty());
    }
}
