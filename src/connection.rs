use serde::Serialize;

use crate::{errors::OrmGraphError, sql::SqlValue};

/// A value bound to a statement under its rendered name (`@p0`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub value: SqlValue,
}

impl Parameter {
    pub fn new(name: &str, value: impl Into<SqlValue>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

pub type Row = Vec<SqlValue>;

/// The database session statements run against.
pub trait Connection {
    fn open(&mut self) -> Result<(), OrmGraphError>;
    fn close(&mut self) -> Result<(), OrmGraphError>;
    fn is_open(&self) -> bool;

    /// Runs one statement and returns the number of rows it affected.
    fn execute(&mut self, sql: &str, parameters: &[Parameter]) -> Result<usize, OrmGraphError>;

    fn query(&mut self, sql: &str, parameters: &[Parameter]) -> Result<Vec<Row>, OrmGraphError>;

    /// Runs several statements without parameters.
    fn execute_script(&mut self, sql: &str) -> Result<(), OrmGraphError>;
}

#[cfg(feature = "sqlite-backend")]
pub use sqlite::SqliteConnection;

#[cfg(feature = "sqlite-backend")]
mod sqlite {
    use std::path::{Path, PathBuf};

    use rusqlite::{
        ToSql,
        types::{ToSqlOutput, Value, ValueRef},
    };
    use tracing::trace;

    use super::{Connection, Parameter, Row};
    use crate::{errors::OrmGraphError, sql::SqlValue};

    const TARGET: &str = "ormgraph::sql";

    impl ToSql for SqlValue {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(match self {
                SqlValue::Null => ToSqlOutput::Owned(Value::Null),
                SqlValue::Bool(flag) => ToSqlOutput::Owned(Value::Integer(i64::from(*flag))),
                SqlValue::Int(v) => ToSqlOutput::Owned(Value::Integer(*v)),
                SqlValue::Float(v) => ToSqlOutput::Owned(Value::Real(*v)),
                SqlValue::Decimal(text) | SqlValue::Text(text) => {
                    ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes()))
                }
                SqlValue::Bytes(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
                SqlValue::DateTime(value) => ToSqlOutput::Owned(Value::Text(
                    value.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
                )),
                SqlValue::DateTimeOffset(value) => ToSqlOutput::Owned(Value::Text(
                    value.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
                )),
                SqlValue::Guid(value) => ToSqlOutput::Owned(Value::Blob(value.as_bytes().to_vec())),
            })
        }
    }

    fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(v) => SqlValue::Int(v),
            ValueRef::Real(v) => SqlValue::Float(v),
            ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => SqlValue::Bytes(bytes.to_vec()),
        }
    }

    /// [`Connection`] over a rusqlite handle, on disk or in memory.
    #[derive(Debug)]
    pub struct SqliteConnection {
        path: Option<PathBuf>,
        conn: Option<rusqlite::Connection>,
    }

    impl SqliteConnection {
        /// Opens a private in-memory database.
        pub fn open_in_memory() -> Result<Self, OrmGraphError> {
            let mut connection = Self {
                path: None,
                conn: None,
            };
            connection.open()?;
            Ok(connection)
        }

        pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, OrmGraphError> {
            let mut connection = Self {
                path: Some(path.as_ref().to_path_buf()),
                conn: None,
            };
            connection.open()?;
            Ok(connection)
        }

        pub fn path(&self) -> Option<&Path> {
            self.path.as_deref()
        }

        fn handle(&self) -> Result<&rusqlite::Connection, OrmGraphError> {
            self.conn
                .as_ref()
                .ok_or_else(|| OrmGraphError::connection("connection is closed"))
        }
    }

    fn bind(parameters: &[Parameter]) -> Vec<(&str, &dyn ToSql)> {
        parameters
            .iter()
            .map(|p| (p.name.as_str(), &p.value as &dyn ToSql))
            .collect()
    }

    impl Connection for SqliteConnection {
        fn open(&mut self) -> Result<(), OrmGraphError> {
            if self.conn.is_some() {
                return Ok(());
            }
            let conn = match &self.path {
                Some(path) => rusqlite::Connection::open(path),
                None => rusqlite::Connection::open_in_memory(),
            }
            .map_err(|e| OrmGraphError::connection(e.to_string()))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
                .map_err(|e| OrmGraphError::connection(e.to_string()))?;
            self.conn = Some(conn);
            Ok(())
        }

        fn close(&mut self) -> Result<(), OrmGraphError> {
            if let Some(conn) = self.conn.take() {
                conn.close()
                    .map_err(|(_, e)| OrmGraphError::connection(e.to_string()))?;
            }
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.conn.is_some()
        }

        fn execute(&mut self, sql: &str, parameters: &[Parameter]) -> Result<usize, OrmGraphError> {
            trace!(target: TARGET, sql, "execute");
            let conn = self.handle()?;
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(|e| OrmGraphError::execution(e.to_string()))?;
            stmt.execute(bind(parameters).as_slice())
                .map_err(|e| OrmGraphError::execution(e.to_string()))
        }

        fn query(&mut self, sql: &str, parameters: &[Parameter]) -> Result<Vec<Row>, OrmGraphError> {
            trace!(target: TARGET, sql, "query");
            let conn = self.handle()?;
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(|e| OrmGraphError::execution(e.to_string()))?;
            let width = stmt.column_count();
            let mut rows = stmt
                .query(bind(parameters).as_slice())
                .map_err(|e| OrmGraphError::execution(e.to_string()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(|e| OrmGraphError::execution(e.to_string()))? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    let value = row
                        .get_ref(i)
                        .map_err(|e| OrmGraphError::execution(e.to_string()))?;
                    values.push(from_value_ref(value));
                }
                out.push(values);
            }
            Ok(out)
        }

        fn execute_script(&mut self, sql: &str) -> Result<(), OrmGraphError> {
            self.handle()?
                .execute_batch(sql)
                .map_err(|e| OrmGraphError::execution(e.to_string()))
        }
    }
}
