//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Deploy scripts gate application startup on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | declarations     | Reading and validating declaration files |
//! | 10-19   | load             | Reconciliation against a store           |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use refdata_preload::PreloadError;

// =============================================================================
// Universal (0, 2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Declarations (3-9)
// =============================================================================

/// Declaration file could not be read.
pub const EXIT_DECL_IO: u8 = 3;

/// Declaration file is not valid TOML or has an unexpected shape.
pub const EXIT_DECL_PARSE: u8 = 4;

/// Declaration file parsed but failed validation.
pub const EXIT_DECL_INVALID: u8 = 5;

// =============================================================================
// Load (10-19)
// =============================================================================

/// Database could not be opened.
pub const EXIT_LOAD_STORE: u8 = 10;

/// List data pass failed. Nothing after it ran.
pub const EXIT_LOAD_LIST: u8 = 11;

/// A model declaration has no usable unique field.
pub const EXIT_LOAD_UNIQUE_FIELD: u8 = 12;

/// Store failure during the model data or migration pass.
pub const EXIT_LOAD_RUNTIME: u8 = 13;

/// Ambiguous matches found (and --fail-on-ambiguous is set).
pub const EXIT_LOAD_AMBIGUOUS: u8 = 14;

/// Report could not be written.
pub const EXIT_LOAD_OUTPUT: u8 = 15;

// =============================================================================
// Preload Error Mapping
// =============================================================================

/// Map a PreloadError to its exit code.
pub fn preload_exit_code(err: &PreloadError) -> u8 {
    match err {
        PreloadError::Io(_) => EXIT_DECL_IO,
        PreloadError::ConfigParse(_) => EXIT_DECL_PARSE,
        PreloadError::ConfigValidation(_) => EXIT_DECL_INVALID,
        PreloadError::ListData { .. } => EXIT_LOAD_LIST,
        PreloadError::NoUniqueField { .. } | PreloadError::MissingUniqueValue { .. } => {
            EXIT_LOAD_UNIQUE_FIELD
        }
        PreloadError::Store { .. } => EXIT_LOAD_RUNTIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdata_preload::StoreError;

    #[test]
    fn list_failures_have_their_own_code() {
        let err = PreloadError::ListData {
            model: "app.Reason".into(),
            cause: StoreError::UnknownModel("app.Reason".into()),
        };
        assert_eq!(preload_exit_code(&err), EXIT_LOAD_LIST);
    }

    #[test]
    fn declaration_errors_stay_in_their_range() {
        for err in [
            PreloadError::Io("gone".into()),
            PreloadError::ConfigParse("bad".into()),
            PreloadError::ConfigValidation("empty model".into()),
        ] {
            let code = preload_exit_code(&err);
            assert!((3..10).contains(&code), "{err}: {code}");
        }
    }
}
