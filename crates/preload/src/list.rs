use crate::config::{ListDeclaration, ListEntry};
use crate::error::{PreloadError, StoreError};
use crate::report::PreloadReport;
use crate::store::{Lookup, ModelHandle, ModelResolver, Record, Write};
use crate::value::{FieldValues, Value};

/// Natural key of a list model.
pub const SHORT_CODE_FIELD: &str = "short_code";
/// Display label of a list model.
pub const NAME_FIELD: &str = "name";

enum Applied {
    Created,
    Updated,
}

/// Upsert `(short_code, label)` pairs into list models.
///
/// Fail-fast: the first failure of any kind aborts the pass. Writes already
/// made for earlier models and entries are kept.
pub fn load_list_data<R: ModelResolver>(
    resolver: &R,
    declarations: &[ListDeclaration],
    report: &mut PreloadReport,
) -> Result<(), PreloadError> {
    let summary = &mut report.list;

    for decl in declarations {
        let fail = |cause: StoreError| PreloadError::ListData { model: decl.model.clone(), cause };

        let model = resolver.resolve(&decl.model).map_err(fail)?;
        for entry in &decl.entries {
            match apply_entry(&model, entry).map_err(fail)? {
                Applied::Created => summary.created += 1,
                Applied::Updated => summary.updated += 1,
            }
        }
        log::debug!("list data for {}: {} entries", decl.model, decl.entries.len());
    }

    log::info!(
        "list data loaded: {} created, {} updated",
        summary.created,
        summary.updated
    );
    Ok(())
}

fn apply_entry<M: ModelHandle>(model: &M, entry: &ListEntry) -> Result<Applied, StoreError> {
    let code = Value::Text(entry.short_code.clone());
    let label = Value::Text(entry.label.clone());

    match model.get(SHORT_CODE_FIELD, &code)? {
        Lookup::NotFound => {
            let values = FieldValues::new()
                .with(SHORT_CODE_FIELD, code)
                .with(NAME_FIELD, label);
            match model.create(&values)? {
                Write::Written(_) => Ok(Applied::Created),
                Write::Conflict(reason) => Err(conflict(model, reason)),
            }
        }
        Lookup::Found(mut record) => {
            // Saved even when the label is unchanged
            record.set(NAME_FIELD, label)?;
            match record.save()? {
                Write::Written(()) => Ok(Applied::Updated),
                Write::Conflict(reason) => Err(conflict(model, reason)),
            }
        }
        Lookup::Multiple(count) => Err(StoreError::MultipleFound {
            model: model.name().to_string(),
            field: SHORT_CODE_FIELD.to_string(),
            value: code,
            count,
        }),
    }
}

fn conflict<M: ModelHandle>(model: &M, reason: String) -> StoreError {
    StoreError::Conflict { model: model.name().to_string(), reason }
}
