use chrono::Utc;
use serde_json::Value;

use crate::error::MappingError;
use crate::mapper::path::resolve;
use crate::mapper::schema::{FieldName, MappingSchema};
use crate::types::Offer;

/// Map one JSON element to an offer.
///
/// Only an empty product name is fatal. Every other field degrades to its
/// zero value when the path is absent or the value cannot be coerced.
/// `default_source` fills `source` when the schema does not map it.
pub fn map_offer(
    element: &Value,
    schema: &MappingSchema,
    default_source: &str,
) -> Result<Offer, MappingError> {
    let text = |field| {
        schema
            .path(field)
            .map(|p| resolve(element, p).into_text())
            .unwrap_or_default()
    };
    let decimal = |field| schema.path(field).map_or(0.0, |p| resolve(element, p).to_decimal());
    let percentage = |field| schema.path(field).map_or(0, |p| resolve(element, p).to_percentage());

    let product_name = text(FieldName::ProductName);
    if product_name.trim().is_empty() {
        return Err(MappingError::MissingRequiredField(FieldName::ProductName.as_str()));
    }

    let source = match schema.path(FieldName::Source) {
        Some(p) => resolve(element, p).into_text(),
        None => default_source.to_string(),
    };

    Ok(Offer {
        product_name,
        price: decimal(FieldName::Price),
        original_price: decimal(FieldName::OriginalPrice),
        details: text(FieldName::Details),
        cashback_percentage: percentage(FieldName::CashbackPercentage),
        discount_percentage: 0,
        source,
        received_at: Utc::now(),
    })
}

/// Map a whole document. An array is mapped element by element, anything else
/// as a single element; each result is independent of the others.
pub fn map_document(
    doc: &Value,
    schema: &MappingSchema,
    default_source: &str,
) -> Vec<Result<Offer, MappingError>> {
    match doc {
        Value::Array(items) => items
            .iter()
            .map(|item| map_offer(item, schema, default_source))
            .collect(),
        single => vec![map_offer(single, schema, default_source)],
    }
}
