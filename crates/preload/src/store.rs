//! Model accessor consumed by the reconciliation passes.
//!
//! A store resolves dotted model names (`app.model` or bare `model`) into
//! handles. Every outcome a pass must react to is an explicit variant of
//! [`Lookup`], [`Write`] or [`Removal`]; `Err(StoreError)` is reserved for
//! failures no pass recovers from.

use crate::error::StoreError;
use crate::value::{FieldValues, Value};

/// Schema metadata for one field of a model.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldMeta {
    pub name: String,
    pub unique: bool,
    pub primary_key: bool,
    /// Value assigned by the store on insert (an auto-increment row id).
    pub generated: bool,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), unique: false, primary_key: false, generated: false }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.unique = true;
        self
    }

    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    /// The record's own identifier, never used as a natural key. A primary key
    /// holding declared data (`iso TEXT PRIMARY KEY`) is not an identifier.
    pub fn is_identifier(&self) -> bool {
        self.generated || self.name == "id"
    }
}

/// Result of a single-record lookup.
#[derive(Debug)]
pub enum Lookup<R> {
    Found(R),
    NotFound,
    Multiple(usize),
}

/// Result of a create or save.
#[derive(Debug)]
pub enum Write<T> {
    Written(T),
    /// Uniqueness or other integrity constraint rejected the write.
    Conflict(String),
}

/// Result of a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// Another record depends on this one through a protected reference.
    Blocked(String),
}

pub trait ModelResolver {
    type Handle: ModelHandle;

    fn resolve(&self, name: &str) -> Result<Self::Handle, StoreError>;
}

pub trait ModelHandle {
    type Record: Record;

    /// The dotted name this handle was resolved from.
    fn name(&self) -> &str;

    /// Field metadata in schema order.
    fn fields(&self) -> Result<Vec<FieldMeta>, StoreError>;

    fn get(&self, field: &str, value: &Value) -> Result<Lookup<Self::Record>, StoreError>;

    fn create(&self, values: &FieldValues) -> Result<Write<Self::Record>, StoreError>;
}

pub trait Record {
    fn value(&self, field: &str) -> Option<&Value>;

    /// Set a field by name. Names outside the model's schema are rejected.
    fn set(&mut self, field: &str, value: Value) -> Result<(), StoreError>;

    /// Persist the record's current field values.
    fn save(&mut self) -> Result<Write<()>, StoreError>;

    fn delete(self) -> Result<Removal, StoreError>;
}

/// First field marked unique that is not the model's own identifier.
pub fn infer_unique_field(fields: &[FieldMeta]) -> Option<&str> {
    fields
        .iter()
        .find(|f| f.unique && !f.is_identifier())
        .map(|f| f.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_skips_identifier() {
        let fields = vec![
            FieldMeta::new("id").unique(),
            FieldMeta::new("name"),
            FieldMeta::new("site_code").unique(),
            FieldMeta::new("alias").unique(),
        ];
        assert_eq!(infer_unique_field(&fields), Some("site_code"));
    }

    #[test]
    fn infer_picks_natural_primary_key() {
        let fields = vec![FieldMeta::new("iso").primary_key(), FieldMeta::new("name")];
        assert_eq!(infer_unique_field(&fields), Some("iso"));
    }

    #[test]
    fn infer_skips_generated_key_with_other_name() {
        let fields = vec![
            FieldMeta::new("site_id").primary_key().generated(),
            FieldMeta::new("name"),
        ];
        assert_eq!(infer_unique_field(&fields), None);
    }
}
