//! SQLite source database operations.

use crate::config::SourceConfig;
use crate::core::{RowSet, SourceReader, Value};
use crate::error::{LoadError, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Single read-only SQLite connection shared by every table read.
///
/// Queries run on the blocking thread pool; the connection is dropped by
/// [`SourceReader::close`] or when the source is dropped.
pub struct SqliteSource {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteSource {
    /// Open the database file read-only. A missing file is an error.
    pub fn open(config: &SourceConfig) -> Result<Self> {
        Self::open_path(&config.path)
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        info!("Opened SQLite database {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Wrap an existing connection (in-memory databases in tests).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn);
            match guard.as_ref() {
                Some(c) => f(c),
                None => Err(LoadError::SourceClosed),
            }
        })
        .await?
    }
}

fn lock(conn: &Mutex<Option<Connection>>) -> MutexGuard<'_, Option<Connection>> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Quote an identifier for SQLite, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

fn read_all(conn: &Connection, table: &str) -> Result<RowSet> {
    let sql = format!("SELECT * FROM {}", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut set = RowSet::new(columns);
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(to_value(row.get_ref(i)?));
        }
        set.push_row(values)?;
    }
    Ok(set)
}

#[async_trait]
impl SourceReader for SqliteSource {
    async fn read_table(&self, table: &str) -> Result<RowSet> {
        let name = table.to_string();
        let set = self.with_conn(move |c| read_all(c, &name)).await?;
        debug!(
            "Read {} rows x {} columns from {}",
            set.len(),
            set.columns().len(),
            table
        );
        Ok(set)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        self.with_conn(move |c| Ok(c.query_row(&sql, [], |r| r.get::<_, i64>(0))?))
            .await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn close(&self) {
        if lock(&self.conn).take().is_some() {
            debug!("Closed SQLite database {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> SqliteSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE users (Id INTEGER, Country TEXT, RegisteredDate TEXT, Score REAL, Avatar BLOB);
            INSERT INTO users VALUES (1, 'DK', '2023-01-02 10:00:00', 1.5, x'0102');
            INSERT INTO users VALUES (2, NULL, 'not-a-date', NULL, NULL);
            CREATE TABLE "we""ird" (x INTEGER);
            "#,
        )
        .unwrap();
        SqliteSource::from_connection(conn)
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn test_read_table_maps_storage_classes() {
        let source = fixture();
        let set = source.read_table("users").await.unwrap();

        assert_eq!(
            set.columns(),
            &["Id", "Country", "RegisteredDate", "Score", "Avatar"]
        );
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.rows()[0],
            vec![
                Value::Integer(1),
                Value::from("DK"),
                Value::from("2023-01-02 10:00:00"),
                Value::Float(1.5),
                Value::Bytes(vec![1, 2]),
            ]
        );
        assert!(set.rows()[1][1].is_null());
    }

    #[tokio::test]
    async fn test_row_count_matches_read() {
        let source = fixture();
        let count = source.row_count("users").await.unwrap();
        let set = source.read_table("users").await.unwrap();
        assert_eq!(count as usize, set.len());
    }

    #[tokio::test]
    async fn test_quoted_table_name() {
        let source = fixture();
        let set = source.read_table("we\"ird").await.unwrap();
        assert!(set.is_empty());
        assert_eq!(set.columns(), &["x"]);
    }

    #[tokio::test]
    async fn test_missing_table_is_source_error() {
        let source = fixture();
        let err = source.read_table("nope").await.unwrap_err();
        assert!(matches!(err, LoadError::Source(_)));
    }

    #[tokio::test]
    async fn test_read_after_close_fails() {
        let source = fixture();
        source.close().await;
        let err = source.read_table("users").await.unwrap_err();
        assert!(matches!(err, LoadError::SourceClosed));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        assert!(SqliteSource::open_path(&path).is_err());
    }
}
