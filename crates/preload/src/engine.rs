use crate::config::PreloadData;
use crate::error::PreloadError;
use crate::list::load_list_data;
use crate::records::load_model_data;
use crate::report::PreloadReport;
use crate::store::ModelResolver;
use crate::unique::migrate_unique_fields;

/// Run list, model and unique-field reconciliation, in that order.
///
/// Declarations are validated first, whether parsed or built in code. A
/// list-pass failure aborts the run before the other passes start.
pub fn reconcile<R: ModelResolver>(
    resolver: &R,
    data: &PreloadData,
) -> Result<PreloadReport, PreloadError> {
    data.validate()?;
    let mut report = PreloadReport::default();
    load_list_data(resolver, &data.list_data, &mut report)?;
    load_model_data(resolver, &data.model_data, &mut report)?;
    migrate_unique_fields(resolver, &data.unique_field_data, &mut report)?;
    Ok(report)
}

/// Owns a resolver for callers that keep one store for the process lifetime.
pub struct Preloader<R> {
    resolver: R,
}

impl<R: ModelResolver> Preloader<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn into_inner(self) -> R {
        self.resolver
    }

    pub fn reconcile(&self, data: &PreloadData) -> Result<PreloadReport, PreloadError> {
        log::info!(
            "preloading {} list, {} model and {} unique-field declarations",
            data.list_data.len(),
            data.model_data.len(),
            data.unique_field_data.len()
        );
        reconcile(&self.resolver, data)
    }

    pub fn load_list_data(&self, data: &PreloadData) -> Result<PreloadReport, PreloadError> {
        let mut report = PreloadReport::default();
        load_list_data(&self.resolver, &data.list_data, &mut report)?;
        Ok(report)
    }

    pub fn load_model_data(&self, data: &PreloadData) -> Result<PreloadReport, PreloadError> {
        let mut report = PreloadReport::default();
        load_model_data(&self.resolver, &data.model_data, &mut report)?;
        Ok(report)
    }

    pub fn migrate_unique_fields(&self, data: &PreloadData) -> Result<PreloadReport, PreloadError> {
        let mut report = PreloadReport::default();
        migrate_unique_fields(&self.resolver, &data.unique_field_data, &mut report)?;
        Ok(report)
    }
}
