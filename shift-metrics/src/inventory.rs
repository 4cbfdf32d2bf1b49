//! Inventory levels shown next to the line counters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const UNKNOWN_PRODUCT: &str = "Unknown";

#[derive(Debug, Clone, Deserialize)]
pub struct RawInventoryRecord {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryItem {
    pub product_name: String,
    pub quantity: f64,
    /// Quantity rounded to two decimals.
    pub display_quantity: String,
}

impl InventoryItem {
    pub fn new(product_name: &str, quantity: f64) -> Self {
        let trimmed = product_name.trim();
        InventoryItem {
            product_name: if trimmed.is_empty() {
                UNKNOWN_PRODUCT.to_owned()
            } else {
                trimmed.to_owned()
            },
            quantity,
            display_quantity: format!("{quantity:.2}"),
        }
    }
}

fn parse_quantity(value: &Value) -> Option<f64> {
    let quantity = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    quantity.is_finite().then_some(quantity)
}

/// Normalises inventory records, dropping those without a usable quantity.
///
/// Returns the items and the number of records dropped.
pub fn normalize(records: &[RawInventoryRecord]) -> (Vec<InventoryItem>, usize) {
    let mut dropped = 0;
    let items = records
        .iter()
        .filter_map(|r| {
            let quantity = r.quantity.as_ref().and_then(parse_quantity);
            if quantity.is_none() {
                debug!(product = ?r.product_name, "dropping inventory record without quantity");
                dropped += 1;
            }
            Some(InventoryItem::new(r.product_name.as_deref().unwrap_or(""), quantity?))
        })
        .collect();
    (items, dropped)
}
