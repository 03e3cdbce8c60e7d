//! `refdata load` and `refdata validate`.

use std::path::PathBuf;

use refdata_preload::{reconcile, PreloadData, PreloadReport};

use crate::exit_codes::{EXIT_LOAD_AMBIGUOUS, EXIT_LOAD_OUTPUT};
use crate::{open_store, read_declarations, CliError};

/// Set to a non-empty value other than `0` to make `load` a no-op, e.g. while
/// the test suite or schema migrations start the application.
pub const SKIP_ENV: &str = "REFDATA_SKIP_PRELOAD";

fn skip_requested(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some(v) if !v.is_empty() && v != "0")
}

pub fn cmd_load(
    declarations: PathBuf,
    db: PathBuf,
    tables: Vec<String>,
    json_output: bool,
    output_file: Option<PathBuf>,
    fail_on_ambiguous: bool,
) -> Result<(), CliError> {
    if skip_requested(std::env::var(SKIP_ENV).ok().as_deref()) {
        eprintln!("{SKIP_ENV} is set, skipping preload");
        return Ok(());
    }

    let data = read_declarations(&declarations)?;
    let store = open_store(&db, &tables)?;

    log::info!("preloading {} into {}", declarations.display(), db.display());
    let report = reconcile(&store, &data).map_err(|e| {
        let restart = if e.is_list_failure() {
            "Failed to update list data! Fix the issue and restart."
        } else {
            "Failed to update reference data! Fix the issue and restart."
        };
        CliError::preload(e).with_hint(restart)
    })?;

    // Output
    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::new(EXIT_LOAD_OUTPUT, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::new(EXIT_LOAD_OUTPUT, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    print_summary(&report);

    if fail_on_ambiguous && report.has_ambiguities() {
        return Err(CliError::new(
            EXIT_LOAD_AMBIGUOUS,
            format!("{} ambiguous match(es) found (fail_on_ambiguous)", report.ambiguities.len()),
        ));
    }

    Ok(())
}

fn print_summary(report: &PreloadReport) {
    eprintln!(
        "list data: {} created, {} updated",
        report.list.created, report.list.updated,
    );
    eprintln!(
        "model data: {} created, {} updated, {} skipped",
        report.model.created, report.model.updated, report.model.skipped,
    );
    let u = &report.unique_field;
    eprintln!(
        "unique fields: {} migrated, {} already migrated, {} nothing to migrate, {} stale deleted, {} stale retained",
        u.migrated, u.already_migrated, u.nothing_to_migrate, u.stale_deleted, u.stale_retained,
    );
    for a in &report.ambiguities {
        eprintln!(
            "  ambiguous: {}.{} = {} matched {} records, left unchanged",
            a.model, a.field, a.value, a.matches,
        );
    }
}

pub fn cmd_validate(declarations: PathBuf) -> Result<(), CliError> {
    let data = read_declarations(&declarations)?;
    eprintln!("{}: ok", declarations.display());
    eprintln!("{}", describe(&data));
    Ok(())
}

fn describe(data: &PreloadData) -> String {
    let entries: usize = data.list_data.iter().map(|d| d.entries.len()).sum();
    let records: usize = data.model_data.iter().map(|d| d.records.len()).sum();
    let remaps: usize = data.unique_field_data.iter().map(|d| d.fields.len()).sum();
    format!(
        "{} list model(s) with {} entries, {} model declaration(s) with {} records, {} unique-field remap(s)",
        data.list_data.len(),
        entries,
        data.model_data.len(),
        records,
        remaps,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdata_preload::config::Remap;
    use refdata_preload::FieldValues;

    #[test]
    fn skip_needs_a_truthy_value() {
        assert!(!skip_requested(None));
        assert!(!skip_requested(Some("")));
        assert!(!skip_requested(Some("0")));
        assert!(skip_requested(Some("1")));
        assert!(skip_requested(Some("migrate")));
    }

    #[test]
    fn describe_counts_every_section() {
        let data = PreloadData::new()
            .list("app.Reason", [("other", "Other"), ("missed", "Missed")])
            .records("app.Site", None, vec![FieldValues::new().with("site_code", "10")])
            .remap("app.Site", "site_code", Remap::new("10", "10A"));
        assert_eq!(
            describe(&data),
            "1 list model(s) with 2 entries, 1 model declaration(s) with 1 records, 1 unique-field remap(s)"
        );
    }
}
