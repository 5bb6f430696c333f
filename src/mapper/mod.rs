//! Schema-driven mapping of arbitrary JSON documents into offers.

pub mod field_mapper;
pub mod path;
pub mod schema;

pub use field_mapper::{map_document, map_offer};
pub use schema::{FieldName, MappingSchema};
