use serde::Serialize;

use crate::value::Value;

// ---------------------------------------------------------------------------
// Per-pass counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub created: usize,
    pub updated: usize,
    /// Creates or saves dropped on an integrity conflict.
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub migrated: usize,
    pub already_migrated: usize,
    pub nothing_to_migrate: usize,
    pub stale_deleted: usize,
    /// Stale records kept because another record references them.
    pub stale_retained: usize,
    /// Renames dropped on an integrity conflict.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Unique-field migration
// ---------------------------------------------------------------------------

/// Observed state of one (model, field) remap before it was acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    NewMissingOldMissing,
    NewMissingOldPresent,
    NewPresentOldMissing,
    NewPresentOldPresent,
    /// A lookup matched more than one record; nothing was changed.
    Ambiguous,
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewMissingOldMissing => write!(f, "new_missing_old_missing"),
            Self::NewMissingOldPresent => write!(f, "new_missing_old_present"),
            Self::NewPresentOldMissing => write!(f, "new_present_old_missing"),
            Self::NewPresentOldPresent => write!(f, "new_present_old_present"),
            Self::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMigration {
    pub model: String,
    pub field: String,
    pub old: Value,
    pub new: Value,
    pub state: MigrationState,
}

/// A lookup that matched several records where at most one was expected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ambiguity {
    pub model: String,
    pub field: String,
    pub value: Value,
    pub matches: usize,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreloadReport {
    pub list: PassSummary,
    pub model: PassSummary,
    pub unique_field: MigrationSummary,
    pub migrations: Vec<FieldMigration>,
    pub ambiguities: Vec<Ambiguity>,
}

impl PreloadReport {
    pub fn has_ambiguities(&self) -> bool {
        !self.ambiguities.is_empty()
    }
}
