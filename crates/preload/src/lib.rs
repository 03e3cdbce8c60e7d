//! `refdata-preload`: Reference-data reconciliation engine.
//!
//! Pure engine crate: receives declarations and a model accessor, applies
//! idempotent create/update/delete passes. No CLI or database dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod list;
pub mod memory;
pub mod records;
pub mod report;
pub mod store;
pub mod unique;
pub mod value;

pub use config::PreloadData;
pub use engine::{reconcile, Preloader};
pub use error::{PreloadError, StoreError};
pub use report::PreloadReport;
pub use store::{FieldMeta, Lookup, ModelHandle, ModelResolver, Record, Removal, Write};
pub use value::{FieldValues, Value};
