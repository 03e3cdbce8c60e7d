// SQLite persistence for reference-data preloading

pub mod schema;
pub mod store;

pub use schema::table_name;
pub use store::{SqliteModel, SqliteRecord, SqliteStore};
