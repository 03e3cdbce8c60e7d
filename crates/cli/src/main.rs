// refdata CLI - bring reference-data tables in line with their declarations

mod exit_codes;
mod fields;
mod load;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use refdata_preload::{PreloadData, PreloadError};
use refdata_sqlite::SqliteStore;

use exit_codes::{preload_exit_code, EXIT_LOAD_STORE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "refdata")]
#[command(about = "Preload list and reference data into a SQLite database")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile list data, model data and unique-field remaps into a database
    #[command(after_help = "\
Examples:
  refdata load clinic.preload.toml --db app.sqlite3
  refdata load clinic.preload.toml --db app.sqlite3 --json
  refdata load clinic.preload.toml --db app.sqlite3 --table app.Site=sites
  REFDATA_SKIP_PRELOAD=1 refdata load clinic.preload.toml --db app.sqlite3")]
    Load {
        /// Path to the .preload.toml declaration file
        declarations: PathBuf,

        /// SQLite database holding the reference tables
        #[arg(long, env = "REFDATA_DB")]
        db: PathBuf,

        /// Map a model to a table other than its app_model default (MODEL=TABLE)
        #[arg(long = "table", value_name = "MODEL=TABLE")]
        tables: Vec<String>,

        /// Output the JSON report to stdout instead of a human summary
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit non-zero when a remap matched more than one record
        #[arg(long)]
        fail_on_ambiguous: bool,
    },

    /// Parse and validate a declaration file without touching a database
    #[command(after_help = "\
Examples:
  refdata validate clinic.preload.toml")]
    Validate {
        /// Path to the .preload.toml declaration file
        declarations: PathBuf,
    },

    /// Show a model's fields and the unique field used to match records
    #[command(after_help = "\
Examples:
  refdata fields app.Site --db app.sqlite3
  refdata fields app.Site --db app.sqlite3 --json")]
    Fields {
        /// Dotted model name (app.model or model)
        model: String,

        /// SQLite database holding the reference tables
        #[arg(long, env = "REFDATA_DB")]
        db: PathBuf,

        /// Map a model to a table other than its app_model default (MODEL=TABLE)
        #[arg(long = "table", value_name = "MODEL=TABLE")]
        tables: Vec<String>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: refdata <command> [options]");
            eprintln!("       refdata --help for more information");
            Ok(())
        }
        Some(Commands::Load { declarations, db, tables, json, output, fail_on_ambiguous }) => {
            load::cmd_load(declarations, db, tables, json, output, fail_on_ambiguous)
        }
        Some(Commands::Validate { declarations }) => load::cmd_validate(declarations),
        Some(Commands::Fields { model, db, tables, json }) => {
            fields::cmd_fields(model, db, tables, json)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Create error from a preload error with the matching exit code.
    pub fn preload(err: PreloadError) -> Self {
        let code = preload_exit_code(&err);
        let hint = match &err {
            PreloadError::NoUniqueField { .. } => {
                Some("set unique_field on the declaration or add a UNIQUE column".to_string())
            }
            PreloadError::ConfigParse(_) => {
                Some("expected [[list]], [[model]] and [[unique_field]] tables".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn read_declarations(path: &Path) -> Result<PreloadData, CliError> {
    PreloadData::from_path(path).map_err(CliError::preload)
}

/// Parse a `MODEL=TABLE` override.
fn parse_table_override(arg: &str) -> Result<(&str, &str), CliError> {
    match arg.split_once('=') {
        Some((model, table)) if !model.trim().is_empty() && !table.trim().is_empty() => {
            Ok((model.trim(), table.trim()))
        }
        _ => Err(CliError::args(format!("invalid --table {:?}", arg))
            .with_hint("expected MODEL=TABLE, e.g. --table app.Site=sites")),
    }
}

/// Open an existing database. A missing file is an error rather than a fresh
/// empty database, since the schema is owned elsewhere.
fn open_store(db: &Path, tables: &[String]) -> Result<SqliteStore, CliError> {
    let overrides = tables
        .iter()
        .map(|arg| parse_table_override(arg))
        .collect::<Result<Vec<_>, _>>()?;

    if !db.is_file() {
        return Err(CliError::new(EXIT_LOAD_STORE, format!("database not found: {}", db.display()))
            .with_hint("run the application's schema migrations first"));
    }
    let mut store = SqliteStore::open(db).map_err(|e| {
        CliError::new(EXIT_LOAD_STORE, format!("cannot open {}: {e}", db.display()))
    })?;
    for (model, table) in overrides {
        store = store.with_table(model, table);
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_override_splits_on_first_equals() {
        let (model, table) = parse_table_override("app.Site = sites").unwrap();
        assert_eq!(model, "app.Site");
        assert_eq!(table, "sites");
    }

    #[test]
    fn table_override_requires_both_sides() {
        for bad in ["app.Site", "=sites", "app.Site="] {
            let err = parse_table_override(bad).unwrap_err();
            assert_eq!(err.code, EXIT_USAGE, "{bad}");
        }
    }
}
