use crate::config::{Remap, UniqueFieldDeclaration};
use crate::error::{PreloadError, StoreError};
use crate::report::{Ambiguity, FieldMigration, MigrationState, PreloadReport};
use crate::store::{Lookup, ModelHandle, ModelResolver, Record, Removal, Write};
use crate::value::Value;

/// Move unique-field values from `old` to `new`.
///
/// Each (model, field) is one check-then-act step:
///
/// | new     | old     | action                              |
/// |---------|---------|-------------------------------------|
/// | missing | missing | nothing                             |
/// | missing | present | rename old → new                    |
/// | present | missing | nothing, already migrated           |
/// | present | present | delete the stale old record         |
///
/// A stale record that other data references is kept. Ambiguous lookups are
/// reported and the field is left alone.
pub fn migrate_unique_fields<R: ModelResolver>(
    resolver: &R,
    declarations: &[UniqueFieldDeclaration],
    report: &mut PreloadReport,
) -> Result<(), PreloadError> {
    for decl in declarations {
        let store_err = |cause: StoreError| PreloadError::Store { model: decl.model.clone(), cause };

        let model = resolver.resolve(&decl.model).map_err(store_err)?;
        for (field, remap) in &decl.fields {
            // Both lookups would hit the same record and delete it as stale
            if remap.old == remap.new {
                return Err(PreloadError::ConfigValidation(format!(
                    "unique_field '{}.{field}': old and new value are both {}",
                    decl.model, remap.old
                )));
            }
            let state = migrate_field(&model, field, remap, report).map_err(store_err)?;
            log::debug!(
                "{}.{field}: {} -> {} ({state})",
                decl.model,
                remap.old,
                remap.new
            );
            report.migrations.push(FieldMigration {
                model: decl.model.clone(),
                field: field.clone(),
                old: remap.old.clone(),
                new: remap.new.clone(),
                state,
            });
        }
    }

    let summary = &report.unique_field;
    log::info!(
        "unique fields migrated: {} renamed, {} stale deleted, {} stale retained",
        summary.migrated,
        summary.stale_deleted,
        summary.stale_retained
    );
    Ok(())
}

fn migrate_field<M: ModelHandle>(
    model: &M,
    field: &str,
    remap: &Remap,
    report: &mut PreloadReport,
) -> Result<MigrationState, StoreError> {
    match model.get(field, &remap.new)? {
        Lookup::Found(_) => match model.get(field, &remap.old)? {
            Lookup::Found(stale) => {
                match stale.delete()? {
                    Removal::Removed => report.unique_field.stale_deleted += 1,
                    Removal::Blocked(reason) => {
                        log::warn!(
                            "{}.{field}: kept stale record {}: {reason}",
                            model.name(),
                            remap.old
                        );
                        report.unique_field.stale_retained += 1;
                    }
                }
                Ok(MigrationState::NewPresentOldPresent)
            }
            Lookup::NotFound => {
                report.unique_field.already_migrated += 1;
                Ok(MigrationState::NewPresentOldMissing)
            }
            Lookup::Multiple(matches) => Ok(ambiguous(report, model, field, &remap.old, matches)),
        },
        Lookup::NotFound => match model.get(field, &remap.old)? {
            Lookup::Found(mut record) => {
                record.set(field, remap.new.clone())?;
                match record.save()? {
                    Write::Written(()) => report.unique_field.migrated += 1,
                    Write::Conflict(reason) => {
                        log::warn!(
                            "{}.{field}: could not rename {} to {}: {reason}",
                            model.name(),
                            remap.old,
                            remap.new
                        );
                        report.unique_field.skipped += 1;
                    }
                }
                Ok(MigrationState::NewMissingOldPresent)
            }
            Lookup::NotFound => {
                report.unique_field.nothing_to_migrate += 1;
                Ok(MigrationState::NewMissingOldMissing)
            }
            Lookup::Multiple(matches) => Ok(ambiguous(report, model, field, &remap.old, matches)),
        },
        Lookup::Multiple(matches) => Ok(ambiguous(report, model, field, &remap.new, matches)),
    }
}

fn ambiguous<M: ModelHandle>(
    report: &mut PreloadReport,
    model: &M,
    field: &str,
    value: &Value,
    matches: usize,
) -> MigrationState {
    log::warn!(
        "{}.{field}: {matches} records match {value}, skipped",
        model.name()
    );
    report.ambiguities.push(Ambiguity {
        model: model.name().to_string(),
        field: field.to_string(),
        value: value.clone(),
        matches,
    });
    MigrationState::Ambiguous
}
