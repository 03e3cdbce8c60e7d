use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::PreloadError;
use crate::value::{FieldValues, Value};

// ---------------------------------------------------------------------------
// Top-level declarations
// ---------------------------------------------------------------------------

/// The three declaration sets consumed by one reconciliation run.
///
/// Order is preserved: models are visited in declaration order and so are
/// the entries, record fields and remapped fields within each model.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreloadData {
    #[serde(default, rename = "list")]
    pub list_data: Vec<ListDeclaration>,
    #[serde(default, rename = "model")]
    pub model_data: Vec<ModelDeclaration>,
    #[serde(default, rename = "unique_field")]
    pub unique_field_data: Vec<UniqueFieldDeclaration>,
}

// ---------------------------------------------------------------------------
// List data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListDeclaration {
    pub model: String,
    #[serde(default)]
    pub entries: Vec<ListEntry>,
}

/// `(short_code, label)`; declared in TOML as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, String)")]
pub struct ListEntry {
    pub short_code: String,
    pub label: String,
}

impl From<(String, String)> for ListEntry {
    fn from((short_code, label): (String, String)) -> Self {
        Self { short_code, label }
    }
}

impl ListEntry {
    pub fn new(short_code: impl Into<String>, label: impl Into<String>) -> Self {
        Self { short_code: short_code.into(), label: label.into() }
    }
}

// ---------------------------------------------------------------------------
// Model data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDeclaration {
    pub model: String,
    /// Natural key used for matching. Inferred from the schema when absent.
    #[serde(default)]
    pub unique_field: Option<String>,
    #[serde(default)]
    pub records: Vec<FieldValues>,
}

// ---------------------------------------------------------------------------
// Unique-field remaps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniqueFieldDeclaration {
    pub model: String,
    pub fields: IndexMap<String, Remap>,
}

/// `(old_value, new_value)`; declared in TOML as a two-element array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(Value, Value)")]
pub struct Remap {
    pub old: Value,
    pub new: Value,
}

impl From<(Value, Value)> for Remap {
    fn from((old, new): (Value, Value)) -> Self {
        Self { old, new }
    }
}

impl Remap {
    pub fn new(old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self { old: old.into(), new: new.into() }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

impl PreloadData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list<I, C, L>(mut self, model: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: Into<String>,
    {
        self.list_data.push(ListDeclaration {
            model: model.into(),
            entries: entries.into_iter().map(|(c, l)| ListEntry::new(c, l)).collect(),
        });
        self
    }

    pub fn records(
        mut self,
        model: impl Into<String>,
        unique_field: Option<&str>,
        records: Vec<FieldValues>,
    ) -> Self {
        self.model_data.push(ModelDeclaration {
            model: model.into(),
            unique_field: unique_field.map(str::to_string),
            records,
        });
        self
    }

    pub fn remap(mut self, model: impl Into<String>, field: impl Into<String>, remap: Remap) -> Self {
        let model = model.into();
        match self.unique_field_data.iter_mut().find(|d| d.model == model) {
            Some(decl) => {
                decl.fields.insert(field.into(), remap);
            }
            None => {
                let mut fields = IndexMap::new();
                fields.insert(field.into(), remap);
                self.unique_field_data.push(UniqueFieldDeclaration { model, fields });
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.list_data.is_empty() && self.model_data.is_empty() && self.unique_field_data.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PreloadData {
    pub fn from_toml(input: &str) -> Result<Self, PreloadError> {
        let data: PreloadData =
            toml::from_str(input).map_err(|e| PreloadError::ConfigParse(e.to_string()))?;
        data.validate()?;
        Ok(data)
    }

    pub fn from_path(path: &Path) -> Result<Self, PreloadError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| PreloadError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), PreloadError> {
        for decl in &self.list_data {
            validate_model_name(&decl.model)?;
            for (i, entry) in decl.entries.iter().enumerate() {
                if entry.short_code.is_empty() {
                    return Err(PreloadError::ConfigValidation(format!(
                        "list '{}', entry #{i}: short code is empty",
                        decl.model
                    )));
                }
            }
        }

        for decl in &self.model_data {
            validate_model_name(&decl.model)?;
            // Inferred unique fields are checked at run time against the schema
            let Some(field) = &decl.unique_field else {
                continue;
            };
            if field.is_empty() {
                return Err(PreloadError::ConfigValidation(format!(
                    "model '{}': unique_field is empty",
                    decl.model
                )));
            }
            for (index, record) in decl.records.iter().enumerate() {
                if !record.contains(field) {
                    return Err(PreloadError::MissingUniqueValue {
                        model: decl.model.clone(),
                        field: field.clone(),
                        index,
                    });
                }
            }
        }

        for decl in &self.unique_field_data {
            validate_model_name(&decl.model)?;
            for (field, remap) in &decl.fields {
                if field.is_empty() {
                    return Err(PreloadError::ConfigValidation(format!(
                        "unique_field '{}': field name is empty",
                        decl.model
                    )));
                }
                if remap.old.is_null() || remap.new.is_null() {
                    return Err(PreloadError::ConfigValidation(format!(
                        "unique_field '{}.{field}': values must not be null",
                        decl.model
                    )));
                }
                // old == new would match the same record twice and delete it
                if remap.old == remap.new {
                    return Err(PreloadError::ConfigValidation(format!(
                        "unique_field '{}.{field}': old and new value are both {}",
                        decl.model, remap.old
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_model_name(name: &str) -> Result<(), PreloadError> {
    let parts: Vec<&str> = name.split('.').collect();
    let well_formed = parts.len() <= 2
        && parts.iter().all(|p| !p.is_empty() && !p.contains(char::is_whitespace));
    if !well_formed {
        return Err(PreloadError::ConfigValidation(format!(
            "invalid model name '{name}' (expected 'app.model' or 'model')"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
