// Table introspection through SQLite pragmas

use rusqlite::Connection;

use refdata_preload::{FieldMeta, StoreError};

/// Default table for a dotted model name: `app.Site` → `app_site`.
pub fn table_name(model: &str) -> String {
    model.replace('.', "_").to_ascii_lowercase()
}

/// Quote an identifier for interpolation into SQL.
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub(crate) fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Columns of `table` in schema order. Empty when the table does not exist.
///
/// A column is unique when it is the table's sole primary-key column or the
/// only column of a non-partial unique index. An `INTEGER PRIMARY KEY` is
/// marked generated.
pub fn read_fields(conn: &Connection, table: &str) -> Result<Vec<FieldMeta>, StoreError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote(table)))
        .map_err(backend)?;
    let columns = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let decl_type: String = row.get(2)?;
            let pk: i64 = row.get(5)?;
            Ok((name, decl_type, pk))
        })
        .map_err(backend)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(backend)?;

    let pk_count = columns.iter().filter(|(_, _, pk)| *pk > 0).count();
    let unique = unique_columns(conn, table)?;

    Ok(columns
        .into_iter()
        .map(|(name, decl_type, pk)| {
            let mut field = FieldMeta::new(name);
            if pk > 0 && pk_count == 1 {
                field = field.primary_key();
                // INTEGER PRIMARY KEY aliases the rowid and is assigned on insert
                if decl_type.eq_ignore_ascii_case("INTEGER") {
                    field = field.generated();
                }
            } else if unique.contains(&field.name) {
                field = field.unique();
            }
            field
        })
        .collect())
}

fn unique_columns(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA index_list({})", quote(table)))
        .map_err(backend)?;
    let indexes = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let unique: i64 = row.get(2)?;
            let partial: i64 = row.get(4)?;
            Ok((name, unique == 1 && partial == 0))
        })
        .map_err(backend)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(backend)?;

    let mut columns = Vec::new();
    for (index, is_unique) in indexes {
        if !is_unique {
            continue;
        }
        let mut info = conn
            .prepare(&format!("PRAGMA index_info({})", quote(&index)))
            .map_err(backend)?;
        // Expression indexes report a NULL column name
        let names = info
            .query_map([], |row| row.get::<_, Option<String>>(2))
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        if let [Some(name)] = names.as_slice() {
            columns.push(name.clone());
        }
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
CREATE TABLE app_site (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    site_code TEXT NOT NULL UNIQUE,
    region TEXT,
    district TEXT
);
CREATE UNIQUE INDEX site_region_district ON app_site (region, district);
CREATE UNIQUE INDEX site_name_active ON app_site (name) WHERE region IS NOT NULL;
"#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn table_names_follow_app_model_convention() {
        assert_eq!(table_name("app.Site"), "app_site");
        assert_eq!(table_name("Country"), "country");
    }

    #[test]
    fn quote_escapes_embedded_quotes() {
        assert_eq!(quote("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn reads_primary_key_and_single_column_unique() {
        let fields = read_fields(&conn(), "app_site").unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "site_code", "region", "district"]);

        assert!(fields[0].primary_key);
        assert!(fields[0].generated);
        assert!(fields[2].unique);
        // Composite and partial indexes do not make a column unique
        assert!(!fields[1].unique);
        assert!(!fields[3].unique);
        assert!(!fields[4].unique);
    }

    #[test]
    fn text_primary_key_is_a_natural_key() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE country (iso TEXT PRIMARY KEY, name TEXT);")
            .unwrap();
        let fields = read_fields(&conn, "country").unwrap();
        assert!(fields[0].primary_key && fields[0].unique);
        assert!(!fields[0].generated);
        assert_eq!(refdata_preload::store::infer_unique_field(&fields), Some("iso"));
    }

    #[test]
    fn missing_table_has_no_fields() {
        assert!(read_fields(&conn(), "app_clinic").unwrap().is_empty());
    }
}
