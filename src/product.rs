//! Serde models for the platform's product endpoint.
//!
//! The same payload carries the event metadata (`model.product`) and, once
//! sales are open, the ticket inventory (`model.variants`).

use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use crate::errors::SniperError;
use crate::types::{EventReference, TicketVariant};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPayload {
    #[serde(default)]
    pub model: Option<ProductModel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductModel {
    #[serde(default)]
    pub product: Option<ProductRecord>,
    #[serde(default)]
    pub variants: Option<Vec<RawVariant>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date_sales_from: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVariant {
    #[serde(default)]
    pub inventory_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "productVariantMaximumReservableQuantity")]
    pub max_reservable_quantity: Option<i64>,
}

impl ProductPayload {
    pub fn from_json(body: &str) -> Result<Self, SniperError> {
        serde_json::from_str(body).map_err(|e| SniperError::parse("body", e.to_string()))
    }

    /// Event metadata; every field is required.
    pub fn event_reference(&self) -> Result<EventReference, SniperError> {
        let product = self
            .model
            .as_ref()
            .and_then(|m| m.product.as_ref())
            .ok_or_else(|| SniperError::parse("model.product", "missing"))?;

        let id = non_empty(product.id.as_deref(), "model.product.id")?;
        let name = non_empty(product.name.as_deref(), "model.product.name")?;
        let raw_start = non_empty(
            product.date_sales_from.as_deref(),
            "model.product.dateSalesFrom",
        )?;
        let sale_start_at = DateTime::parse_from_rfc3339(&raw_start)
            .map_err(|e| SniperError::parse("model.product.dateSalesFrom", e.to_string()))?;

        Ok(EventReference {
            id,
            name,
            sale_start_at,
        })
    }

    /// Well-formed variants in payload order. Entries lacking an inventory id
    /// are dropped; a missing or negative quantity counts as 0.
    pub fn variants(&self) -> Vec<TicketVariant> {
        let raw = match self.model.as_ref().and_then(|m| m.variants.as_ref()) {
            Some(v) => v,
            None => return Vec::new(),
        };

        raw.iter()
            .filter_map(|v| {
                let inventory_id = v.inventory_id.as_deref().map(str::trim).unwrap_or("");
                if inventory_id.is_empty() {
                    debug!(name = ?v.name, "Skipping variant without inventoryId");
                    return None;
                }
                let max = v
                    .max_reservable_quantity
                    .unwrap_or(0)
                    .clamp(0, i64::from(u32::MAX)) as u32;
                Some(TicketVariant {
                    inventory_id: inventory_id.to_string(),
                    name: v.name.clone().unwrap_or_default(),
                    max_reservable_quantity: max,
                })
            })
            .collect()
    }
}

fn non_empty(value: Option<&str>, field: &str) -> Result<String, SniperError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(SniperError::parse(field, "missing")),
    }
}
