//! `refdata fields` - inspect how a model is matched.

use std::path::PathBuf;

use refdata_preload::store::infer_unique_field;
use refdata_preload::{FieldMeta, ModelHandle, ModelResolver, StoreError};
use serde::Serialize;

use crate::exit_codes::{EXIT_LOAD_RUNTIME, EXIT_LOAD_STORE};
use crate::{open_store, CliError};

#[derive(Debug, Serialize)]
struct FieldsOutput {
    model: String,
    table: String,
    fields: Vec<FieldMeta>,
    unique_field: Option<String>,
}

pub fn cmd_fields(
    model: String,
    db: PathBuf,
    tables: Vec<String>,
    json_output: bool,
) -> Result<(), CliError> {
    let store = open_store(&db, &tables)?;
    let handle = store.resolve(&model).map_err(|e| match e {
        StoreError::UnknownModel(_) => CliError::new(EXIT_LOAD_STORE, e.to_string())
            .with_hint("use --table MODEL=TABLE when the table is not named app_model"),
        other => CliError::new(EXIT_LOAD_RUNTIME, other.to_string()),
    })?;
    let fields = handle
        .fields()
        .map_err(|e| CliError::new(EXIT_LOAD_RUNTIME, e.to_string()))?;

    let out = FieldsOutput {
        model: handle.name().to_string(),
        table: handle.table().to_string(),
        unique_field: infer_unique_field(&fields).map(str::to_string),
        fields,
    };

    if json_output {
        let json = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::new(EXIT_LOAD_RUNTIME, format!("JSON serialization error: {e}")))?;
        println!("{json}");
        return Ok(());
    }

    println!("{} (table {})", out.model, out.table);
    for f in &out.fields {
        let flag = if f.primary_key {
            "primary key"
        } else if f.unique {
            "unique"
        } else {
            ""
        };
        println!("  {:<24} {}", f.name, flag);
    }
    match out.unique_field {
        Some(ref name) => println!("matched on: {name}"),
        None => println!("matched on: (none, declare unique_field explicitly)"),
    }
    Ok(())
}
