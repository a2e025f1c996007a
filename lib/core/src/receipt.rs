use crate::vector::Vector;
use serde::{Deserialize, Deserializer, Serialize};

/// One OCR-recognized text line
pub type RawLine = String;

/// A line item as proposed by the structured parser, before validation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftItem {
    pub product_name: String,
    /// Non-numeric input deserializes as NaN and is rejected downstream
    #[serde(default = "nan", deserialize_with = "lenient_quantity")]
    pub quantity: f64,
}

impl DraftItem {
    #[inline]
    #[must_use]
    pub fn new(product_name: impl Into<String>, quantity: f64) -> Self {
        Self {
            product_name: product_name.into(),
            quantity,
        }
    }
}

/// Best-effort receipt produced by the structured parser
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DraftReceipt {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub items: Vec<DraftItem>,
    /// Kept for diagnostics only
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub total_price: Option<f64>,
}

/// A product registered by a user, with its precomputed name embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogProduct {
    pub product_id: String,
    pub product_name: String,
    /// Numeric strings are accepted; anything unusable becomes `None`
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub price: Option<f64>,
    /// `null` or a malformed array becomes the empty vector
    #[serde(default, deserialize_with = "lenient_embedding")]
    pub embedding: Vector,
}

impl CatalogProduct {
    #[inline]
    #[must_use]
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        price: f64,
        embedding: Vector,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            price: Some(price),
            embedding,
        }
    }
}

/// A draft item accepted against the catalog, priced from the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatedItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub total_price: f64,
}

impl ValidatedItem {
    /// Identity and unit price come from the catalog, never from the draft.
    #[must_use]
    pub fn from_match(product: &CatalogProduct, price_per_unit: f64, quantity: f64) -> Self {
        Self {
            product_id: product.product_id.clone(),
            product_name: product.product_name.clone(),
            quantity,
            price_per_unit,
            total_price: price_per_unit * quantity,
        }
    }
}

/// Final reconciled receipt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub user_id: String,
    pub timestamp: String,
    pub items: Vec<ValidatedItem>,
    pub total_price: f64,
}

impl Receipt {
    /// Build the receipt; the total is always the sum of item totals.
    #[must_use]
    pub fn assemble(
        user_id: impl Into<String>,
        timestamp: impl Into<String>,
        items: Vec<ValidatedItem>,
    ) -> Self {
        let total_price = sum_totals(&items);
        Self {
            user_id: user_id.into(),
            timestamp: timestamp.into(),
            items,
            total_price,
        }
    }
}

#[inline]
pub(crate) fn sum_totals(items: &[ValidatedItem]) -> f64 {
    items.iter().map(|item| item.total_price).sum()
}

fn nan() -> f64 {
    f64::NAN
}

fn coerce_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
}

fn lenient_quantity<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_number(&value).unwrap_or(f64::NAN))
}

fn lenient_optional_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_number(&value))
}

fn lenient_embedding<'de, D>(deserializer: D) -> std::result::Result<Vector, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let data = match value {
        serde_json::Value::Array(values) => values
            .iter()
            .map(|v| v.as_f64().map(|x| x as f32))
            .collect::<Option<Vec<f32>>>()
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    Ok(Vector::new(data))
}
