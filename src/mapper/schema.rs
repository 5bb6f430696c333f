use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// Logical offer fields a schema may map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldName {
    ProductName,
    Price,
    OriginalPrice,
    Details,
    CashbackPercentage,
    Source,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::ProductName => "ProductName",
            FieldName::Price => "Price",
            FieldName::OriginalPrice => "OriginalPrice",
            FieldName::Details => "Details",
            FieldName::CashbackPercentage => "CashbackPercentage",
            FieldName::Source => "Source",
        }
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat `FieldName -> path` mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingSchema(BTreeMap<FieldName, String>);

impl MappingSchema {
    /// Parse schema text. Rejects anything that is not a flat object whose keys
    /// are known field names and whose values are strings.
    pub fn parse(text: &str) -> Result<Self, MappingError> {
        serde_json::from_str(text).map_err(|e| MappingError::Schema(e.to_string()))
    }

    pub fn path(&self, field: FieldName) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(FieldName, String)> for MappingSchema {
    fn from_iter<I: IntoIterator<Item = (FieldName, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_string_mapping() {
        let schema = MappingSchema::parse(r#"{"ProductName":"title","Price":"pricing.current"}"#).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.path(FieldName::ProductName), Some("title"));
        assert_eq!(schema.path(FieldName::Price), Some("pricing.current"));
        assert_eq!(schema.path(FieldName::Source), None);
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(MappingSchema::parse("{not json"), Err(MappingError::Schema(_))));
    }

    #[test]
    fn rejects_nested_values_and_unknown_fields() {
        assert!(MappingSchema::parse(r#"{"ProductName":{"path":"title"}}"#).is_err());
        assert!(MappingSchema::parse(r#"{"Discount":"pct"}"#).is_err());
        assert!(MappingSchema::parse(r#"["ProductName"]"#).is_err());
    }
}
