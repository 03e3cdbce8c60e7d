//! In-memory model accessor.
//!
//! Enforces unique fields on create and save, and lets callers mark records as
//! protected so deletes report [`Removal::Blocked`]. Every model gets an
//! implicit integer primary key named `id`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::error::StoreError;
use crate::store::{FieldMeta, Lookup, ModelHandle, ModelResolver, Record, Removal, Write};
use crate::value::{FieldValues, Value};

const ID_FIELD: &str = "id";

#[derive(Debug, Default)]
struct Table {
    name: String,
    fields: Vec<FieldMeta>,
    rows: BTreeMap<u64, FieldValues>,
    next_id: u64,
    protected: HashSet<u64>,
    failing: bool,
}

impl Table {
    fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }

    fn check_fields<'a>(&self, mut names: impl Iterator<Item = &'a str>) -> Result<(), StoreError> {
        match names.find(|n| !self.has_field(n) || *n == ID_FIELD) {
            Some(field) => Err(StoreError::UnknownField {
                model: self.name.clone(),
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn check_backend(&self) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError::Backend(format!("table '{}' is unavailable", self.name)));
        }
        Ok(())
    }

    /// Name of the first unique field whose value is already held by another row.
    fn unique_violation(&self, id: Option<u64>, values: &FieldValues) -> Option<String> {
        self.fields
            .iter()
            .filter(|f| f.unique && !f.generated)
            .find(|f| {
                let Some(value) = values.get(&f.name).filter(|v| !v.is_null()) else {
                    return false;
                };
                self.rows
                    .iter()
                    .any(|(row_id, row)| Some(*row_id) != id && row.get(&f.name) == Some(value))
            })
            .map(|f| format!("UNIQUE constraint failed: {}.{}", self.name, f.name))
    }

    /// Ids of rows whose `field` equals `value`. Null matches nothing, as in SQL.
    fn matching(&self, field: &str, value: &Value) -> Vec<u64> {
        if value.is_null() {
            return Vec::new();
        }
        if field == ID_FIELD {
            return match value {
                Value::Int(n) if *n >= 0 && self.rows.contains_key(&(*n as u64)) => vec![*n as u64],
                _ => Vec::new(),
            };
        }
        self.rows
            .iter()
            .filter(|(_, row)| row.get(field) == Some(value))
            .map(|(id, _)| *id)
            .collect()
    }
}

#[derive(Debug, Default)]
struct Tables {
    models: HashMap<String, Table>,
}

impl Tables {
    fn table(&self, key: &str) -> Result<&Table, StoreError> {
        self.models
            .get(key)
            .ok_or_else(|| StoreError::UnknownModel(key.to_string()))
    }

    fn table_mut(&mut self, key: &str) -> Result<&mut Table, StoreError> {
        self.models
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownModel(key.to_string()))
    }
}

fn model_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. Model names resolve case-insensitively.
    pub fn define(&self, name: &str, fields: Vec<FieldMeta>) -> &Self {
        let mut all = vec![FieldMeta::new(ID_FIELD).primary_key().generated()];
        all.extend(fields.into_iter().filter(|f| f.name != ID_FIELD));
        let table = Table {
            name: name.to_string(),
            fields: all,
            next_id: 1,
            ..Table::default()
        };
        self.inner.borrow_mut().models.insert(model_key(name), table);
        self
    }

    /// Register a list model: unique `short_code` plus `name`.
    pub fn define_list(&self, name: &str) -> &Self {
        self.define(
            name,
            vec![FieldMeta::new("short_code").unique(), FieldMeta::new("name")],
        )
    }

    /// Insert a row directly, subject to the same constraints as `create`.
    pub fn insert(&self, model: &str, values: FieldValues) -> Result<u64, StoreError> {
        let mut tables = self.inner.borrow_mut();
        let table = tables.table_mut(&model_key(model))?;
        table.check_fields(values.field_names())?;
        if let Some(reason) = table.unique_violation(None, &values) {
            return Err(StoreError::Conflict { model: table.name.clone(), reason });
        }
        let id = table.next_id;
        table.next_id += 1;
        table.rows.insert(id, values);
        Ok(id)
    }

    /// Deletes of this record will report a protected reference.
    pub fn protect(&self, model: &str, id: u64) {
        if let Some(table) = self.inner.borrow_mut().models.get_mut(&model_key(model)) {
            table.protected.insert(id);
        }
    }

    /// Make every operation on the model fail with a backend error.
    pub fn fail(&self, model: &str) {
        if let Some(table) = self.inner.borrow_mut().models.get_mut(&model_key(model)) {
            table.failing = true;
        }
    }

    pub fn rows(&self, model: &str) -> Vec<FieldValues> {
        self.inner
            .borrow()
            .models
            .get(&model_key(model))
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, model: &str) -> usize {
        self.rows(model).len()
    }

    pub fn find(&self, model: &str, field: &str, value: impl Into<Value>) -> Vec<FieldValues> {
        let value = value.into();
        self.rows(model)
            .into_iter()
            .filter(|row| row.get(field) == Some(&value))
            .collect()
    }
}

impl ModelResolver for MemoryStore {
    type Handle = MemoryModel;

    fn resolve(&self, name: &str) -> Result<MemoryModel, StoreError> {
        let key = model_key(name);
        if !self.inner.borrow().models.contains_key(&key) {
            return Err(StoreError::UnknownModel(name.to_string()));
        }
        Ok(MemoryModel { inner: Rc::clone(&self.inner), name: name.to_string(), key })
    }
}

// ---------------------------------------------------------------------------
// Model handle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemoryModel {
    inner: Rc<RefCell<Tables>>,
    name: String,
    key: String,
}

impl MemoryModel {
    fn record(&self, id: u64, values: FieldValues) -> MemoryRecord {
        MemoryRecord { inner: Rc::clone(&self.inner), key: self.key.clone(), id, values }
    }
}

impl ModelHandle for MemoryModel {
    type Record = MemoryRecord;

    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Result<Vec<FieldMeta>, StoreError> {
        let tables = self.inner.borrow();
        let table = tables.table(&self.key)?;
        table.check_backend()?;
        Ok(table.fields.clone())
    }

    fn get(&self, field: &str, value: &Value) -> Result<Lookup<MemoryRecord>, StoreError> {
        let tables = self.inner.borrow();
        let table = tables.table(&self.key)?;
        table.check_backend()?;
        if !table.has_field(field) {
            return Err(StoreError::UnknownField { model: self.name.clone(), field: field.to_string() });
        }
        let ids = table.matching(field, value);
        Ok(match ids.as_slice() {
            [] => Lookup::NotFound,
            [id] => Lookup::Found(self.record(*id, table.rows[id].clone())),
            many => Lookup::Multiple(many.len()),
        })
    }

    fn create(&self, values: &FieldValues) -> Result<Write<MemoryRecord>, StoreError> {
        let mut tables = self.inner.borrow_mut();
        let table = tables.table_mut(&self.key)?;
        table.check_backend()?;
        table.check_fields(values.field_names())?;
        if let Some(reason) = table.unique_violation(None, values) {
            return Ok(Write::Conflict(reason));
        }
        let id = table.next_id;
        table.next_id += 1;
        table.rows.insert(id, values.clone());
        Ok(Write::Written(self.record(id, values.clone())))
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemoryRecord {
    inner: Rc<RefCell<Tables>>,
    key: String,
    id: u64,
    values: FieldValues,
}

impl MemoryRecord {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Record for MemoryRecord {
    fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), StoreError> {
        self.inner.borrow().table(&self.key)?.check_fields(std::iter::once(field))?;
        self.values.insert(field, value);
        Ok(())
    }

    fn save(&mut self) -> Result<Write<()>, StoreError> {
        let mut tables = self.inner.borrow_mut();
        let table = tables.table_mut(&self.key)?;
        table.check_backend()?;
        if !table.rows.contains_key(&self.id) {
            return Err(StoreError::Backend(format!(
                "{} record {} no longer exists",
                table.name, self.id
            )));
        }
        if let Some(reason) = table.unique_violation(Some(self.id), &self.values) {
            return Ok(Write::Conflict(reason));
        }
        table.rows.insert(self.id, self.values.clone());
        Ok(Write::Written(()))
    }

    fn delete(self) -> Result<Removal, StoreError> {
        let mut tables = self.inner.borrow_mut();
        let table = tables.table_mut(&self.key)?;
        table.check_backend()?;
        if table.protected.contains(&self.id) {
            return Ok(Removal::Blocked(format!(
                "{} record {} is referenced by protected data",
                table.name, self.id
            )));
        }
        table.rows.remove(&self.id);
        Ok(Removal::Removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.define(
            "app.Site",
            vec![FieldMeta::new("site_code").unique(), FieldMeta::new("name")],
        );
        store
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let store = site_store();
        assert!(store.resolve("APP.site").is_ok());
        assert_eq!(
            store.resolve("app.Clinic").unwrap_err(),
            StoreError::UnknownModel("app.Clinic".into())
        );
    }

    #[test]
    fn fields_lead_with_identifier() {
        let model = site_store().resolve("app.Site").unwrap();
        let fields = model.fields().unwrap();
        assert_eq!(fields[0].name, "id");
        assert!(fields[0].primary_key);
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn create_conflicts_on_unique_field() {
        let store = site_store();
        let model = store.resolve("app.Site").unwrap();
        let values = FieldValues::new().with("site_code", "10");
        assert!(matches!(model.create(&values).unwrap(), Write::Written(_)));
        assert!(matches!(model.create(&values).unwrap(), Write::Conflict(_)));
        assert_eq!(store.count("app.Site"), 1);
    }

    #[test]
    fn save_conflicts_when_taking_another_rows_value() {
        let store = site_store();
        store.insert("app.Site", FieldValues::new().with("site_code", "10")).unwrap();
        store.insert("app.Site", FieldValues::new().with("site_code", "20")).unwrap();
        let model = store.resolve("app.Site").unwrap();
        let Lookup::Found(mut rec) = model.get("site_code", &"20".into()).unwrap() else {
            panic!("expected a record");
        };
        rec.set("site_code", "10".into()).unwrap();
        assert!(matches!(rec.save().unwrap(), Write::Conflict(_)));
    }

    #[test]
    fn set_rejects_unknown_field() {
        let store = site_store();
        store.insert("app.Site", FieldValues::new().with("site_code", "10")).unwrap();
        let model = store.resolve("app.Site").unwrap();
        let Lookup::Found(mut rec) = model.get("site_code", &"10".into()).unwrap() else {
            panic!("expected a record");
        };
        let err = rec.set("colour", "red".into()).unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { .. }));
    }

    #[test]
    fn lookup_reports_multiple_on_non_unique_field() {
        let store = site_store();
        store.insert("app.Site", FieldValues::new().with("site_code", "10").with("name", "A")).unwrap();
        store.insert("app.Site", FieldValues::new().with("site_code", "11").with("name", "A")).unwrap();
        let model = store.resolve("app.Site").unwrap();
        assert!(matches!(model.get("name", &"A".into()).unwrap(), Lookup::Multiple(2)));
        assert!(matches!(model.get("name", &"B".into()).unwrap(), Lookup::NotFound));
    }

    #[test]
    fn protected_record_is_not_deleted() {
        let store = site_store();
        let id = store.insert("app.Site", FieldValues::new().with("site_code", "10")).unwrap();
        store.protect("app.Site", id);
        let model = store.resolve("app.Site").unwrap();
        let Lookup::Found(rec) = model.get("id", &Value::Int(id as i64)).unwrap() else {
            panic!("expected a record");
        };
        assert!(matches!(rec.delete().unwrap(), Removal::Blocked(_)));
        assert_eq!(store.count("app.Site"), 1);
    }

    #[test]
    fn failing_model_reports_backend_error() {
        let store = site_store();
        store.fail("app.Site");
        let model = store.resolve("app.Site").unwrap();
        assert!(matches!(model.get("site_code", &"10".into()), Err(StoreError::Backend(_))));
    }
}
