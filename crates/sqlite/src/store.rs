// SQLite-backed model accessor

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode, OptionalExtension};

use refdata_preload::{
    FieldMeta, FieldValues, Lookup, ModelHandle, ModelResolver, Record, Removal, StoreError, Value,
    Write,
};

use crate::schema::{backend, quote, read_fields, table_name};

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(n) => SqlValue::Integer(*n),
        Value::Float(x) => SqlValue::Real(*x),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(bytes) => SqlValue::Blob(bytes.clone()),
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(n) => Value::Int(n),
        SqlValue::Real(x) => Value::Float(x),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(bytes) => Value::Blob(bytes),
    }
}

/// Extended result code of a constraint violation, if `e` is one.
fn constraint_code(e: &rusqlite::Error) -> Option<i32> {
    match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            Some(err.extended_code)
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Rc<Connection>,
    tables: HashMap<String, String>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path).map_err(backend)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory().map_err(backend)?)
    }

    /// Wrap an existing connection. Foreign keys are switched on so that
    /// deletes of referenced rows are refused.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(backend)?;
        Ok(Self { conn: Rc::new(conn), tables: HashMap::new() })
    }

    /// Map a model name to a table other than the `app_model` default.
    pub fn with_table(mut self, model: &str, table: &str) -> Self {
        self.tables.insert(model.to_ascii_lowercase(), table.to_string());
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(sql).map_err(backend)
    }

    fn table_for(&self, model: &str) -> String {
        self.tables
            .get(&model.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| table_name(model))
    }
}

impl ModelResolver for SqliteStore {
    type Handle = SqliteModel;

    fn resolve(&self, name: &str) -> Result<SqliteModel, StoreError> {
        let table = self.table_for(name);
        let fields = read_fields(&self.conn, &table)?;
        if fields.is_empty() {
            return Err(StoreError::UnknownModel(name.to_string()));
        }
        log::debug!("resolved {name} to table {table} ({} columns)", fields.len());
        Ok(SqliteModel {
            conn: Rc::clone(&self.conn),
            name: name.to_string(),
            table,
            fields: Rc::new(fields),
        })
    }
}

// ---------------------------------------------------------------------------
// Model handle
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SqliteModel {
    conn: Rc<Connection>,
    name: String,
    table: String,
    fields: Rc<Vec<FieldMeta>>,
}

impl SqliteModel {
    pub fn table(&self) -> &str {
        &self.table
    }

    fn check_field(&self, field: &str) -> Result<(), StoreError> {
        if self.fields.iter().any(|f| f.name == field) {
            Ok(())
        } else {
            Err(StoreError::UnknownField { model: self.name.clone(), field: field.to_string() })
        }
    }

    fn select_list(&self) -> String {
        let columns: Vec<String> = self.fields.iter().map(|f| quote(&f.name)).collect();
        format!("SELECT rowid, {} FROM {}", columns.join(", "), quote(&self.table))
    }

    fn read_row(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, FieldValues)> {
        let rowid: i64 = row.get(0)?;
        let mut values = FieldValues::new();
        for (i, field) in self.fields.iter().enumerate() {
            let value: SqlValue = row.get(i + 1)?;
            values.insert(field.name.clone(), from_sql(value));
        }
        Ok((rowid, values))
    }

    fn record(&self, rowid: i64, values: FieldValues) -> SqliteRecord {
        SqliteRecord {
            conn: Rc::clone(&self.conn),
            name: self.name.clone(),
            table: self.table.clone(),
            fields: Rc::clone(&self.fields),
            rowid,
            values,
        }
    }

    fn fetch(&self, rowid: i64) -> Result<Option<SqliteRecord>, StoreError> {
        let sql = format!("{} WHERE rowid = ?1", self.select_list());
        let row = self
            .conn
            .query_row(&sql, [rowid], |row| self.read_row(row))
            .optional()
            .map_err(backend)?;
        Ok(row.map(|(rowid, values)| self.record(rowid, values)))
    }
}

impl ModelHandle for SqliteModel {
    type Record = SqliteRecord;

    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Result<Vec<FieldMeta>, StoreError> {
        Ok(self.fields.as_ref().clone())
    }

    fn get(&self, field: &str, value: &Value) -> Result<Lookup<SqliteRecord>, StoreError> {
        self.check_field(field)?;
        let sql = format!("{} WHERE {} = ?1 LIMIT 2", self.select_list(), quote(field));
        let mut stmt = self.conn.prepare(&sql).map_err(backend)?;
        let rows = stmt
            .query_map([to_sql(value)], |row| self.read_row(row))
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;

        let mut rows = rows.into_iter();
        match (rows.next(), rows.next()) {
            (None, _) => Ok(Lookup::NotFound),
            (Some((rowid, values)), None) => Ok(Lookup::Found(self.record(rowid, values))),
            (Some(_), Some(_)) => {
                let count: i64 = self
                    .conn
                    .query_row(
                        &format!(
                            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                            quote(&self.table),
                            quote(field)
                        ),
                        [to_sql(value)],
                        |row| row.get(0),
                    )
                    .map_err(backend)?;
                Ok(Lookup::Multiple(count as usize))
            }
        }
    }

    fn create(&self, values: &FieldValues) -> Result<Write<SqliteRecord>, StoreError> {
        for field in values.field_names() {
            self.check_field(field)?;
        }

        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(&self.table))
        } else {
            let columns: Vec<String> = values.field_names().map(quote).collect();
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(&self.table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let params = params_from_iter(values.iter().map(|(_, v)| to_sql(v)));
        if let Err(e) = self.conn.execute(&sql, params) {
            return match constraint_code(&e) {
                Some(_) => Ok(Write::Conflict(e.to_string())),
                None => Err(backend(e)),
            };
        }

        let rowid = self.conn.last_insert_rowid();
        match self.fetch(rowid)? {
            Some(record) => Ok(Write::Written(record)),
            None => Err(StoreError::Backend(format!(
                "{}: inserted row {rowid} could not be read back",
                self.name
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SqliteRecord {
    conn: Rc<Connection>,
    name: String,
    table: String,
    fields: Rc<Vec<FieldMeta>>,
    rowid: i64,
    values: FieldValues,
}

impl SqliteRecord {
    pub fn rowid(&self) -> i64 {
        self.rowid
    }
}

impl Record for SqliteRecord {
    fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), StoreError> {
        if !self.fields.iter().any(|f| f.name == field) {
            return Err(StoreError::UnknownField { model: self.name.clone(), field: field.to_string() });
        }
        self.values.insert(field, value);
        Ok(())
    }

    fn save(&mut self) -> Result<Write<()>, StoreError> {
        let assignments: Vec<String> = self
            .values
            .field_names()
            .enumerate()
            .map(|(i, name)| format!("{} = ?{}", quote(name), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE rowid = ?{}",
            quote(&self.table),
            assignments.join(", "),
            self.values.len() + 1
        );

        let mut params: Vec<SqlValue> = self.values.iter().map(|(_, v)| to_sql(v)).collect();
        params.push(SqlValue::Integer(self.rowid));

        match self.conn.execute(&sql, params_from_iter(params)) {
            Ok(0) => Err(StoreError::Backend(format!(
                "{} row {} no longer exists",
                self.name, self.rowid
            ))),
            Ok(_) => Ok(Write::Written(())),
            Err(e) => match constraint_code(&e) {
                Some(_) => Ok(Write::Conflict(e.to_string())),
                None => Err(backend(e)),
            },
        }
    }

    fn delete(self) -> Result<Removal, StoreError> {
        let sql = format!("DELETE FROM {} WHERE rowid = ?1", quote(&self.table));
        match self.conn.execute(&sql, [self.rowid]) {
            Ok(_) => Ok(Removal::Removed),
            Err(e) => match constraint_code(&e) {
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) | Some(ffi::SQLITE_CONSTRAINT_TRIGGER) => {
                    Ok(Removal::Blocked(e.to_string()))
                }
                _ => Err(backend(e)),
            },
        }
    }
}
