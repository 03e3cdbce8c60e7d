use crate::config::ModelDeclaration;
use crate::error::{PreloadError, StoreError};
use crate::report::{Ambiguity, PreloadReport};
use crate::store::{infer_unique_field, Lookup, ModelHandle, ModelResolver, Record, Write};

/// Create or update records in arbitrary models, matched on a unique field.
///
/// Integrity conflicts are skipped and counted; ambiguous matches are
/// reported and skipped. Configuration defects (unresolvable model, no
/// unique field, record without a key value, unknown field) and backend
/// failures abort the pass.
pub fn load_model_data<R: ModelResolver>(
    resolver: &R,
    declarations: &[ModelDeclaration],
    report: &mut PreloadReport,
) -> Result<(), PreloadError> {
    for decl in declarations {
        let store_err = |cause: StoreError| PreloadError::Store { model: decl.model.clone(), cause };

        let model = resolver.resolve(&decl.model).map_err(store_err)?;
        let unique_field = resolve_unique_field(&model, decl)?;

        // Every record must carry its key before anything is written
        if let Some(index) = decl.records.iter().position(|r| !r.contains(&unique_field)) {
            return Err(PreloadError::MissingUniqueValue {
                model: decl.model.clone(),
                field: unique_field,
                index,
            });
        }

        for values in &decl.records {
            let Some(key) = values.get(&unique_field) else {
                continue;
            };
            match model.get(&unique_field, key).map_err(store_err)? {
                Lookup::NotFound => match model.create(values).map_err(store_err)? {
                    Write::Written(_) => report.model.created += 1,
                    Write::Conflict(reason) => {
                        log::debug!("{}: skipped create of {unique_field}={key}: {reason}", decl.model);
                        report.model.skipped += 1;
                    }
                },
                Lookup::Found(mut record) => {
                    for (field, value) in values.iter() {
                        record.set(field, value.clone()).map_err(store_err)?;
                    }
                    match record.save().map_err(store_err)? {
                        Write::Written(()) => report.model.updated += 1,
                        Write::Conflict(reason) => {
                            log::warn!("{}: skipped update of {unique_field}={key}: {reason}", decl.model);
                            report.model.skipped += 1;
                        }
                    }
                }
                Lookup::Multiple(matches) => {
                    log::warn!(
                        "{}: {matches} records match {unique_field}={key}, skipped",
                        decl.model
                    );
                    report.ambiguities.push(Ambiguity {
                        model: decl.model.clone(),
                        field: unique_field.clone(),
                        value: key.clone(),
                        matches,
                    });
                }
            }
        }
    }

    log::info!(
        "model data loaded: {} created, {} updated, {} skipped",
        report.model.created,
        report.model.updated,
        report.model.skipped
    );
    Ok(())
}

/// Explicit unique field, else the first unique non-identifier field of the schema.
fn resolve_unique_field<M: ModelHandle>(
    model: &M,
    decl: &ModelDeclaration,
) -> Result<String, PreloadError> {
    if let Some(field) = &decl.unique_field {
        return Ok(field.clone());
    }
    let fields = model.fields().map_err(|cause| PreloadError::Store {
        model: decl.model.clone(),
        cause,
    })?;
    let field = infer_unique_field(&fields)
        .ok_or_else(|| PreloadError::NoUniqueField { model: decl.model.clone() })?;
    log::debug!("{}: inferred unique field '{field}'", decl.model);
    Ok(field.to_string())
}
