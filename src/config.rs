//! Runtime configuration: target dialect, batching limits and logging options.
//!
//! A configuration picks one [`Dialect`] preset and may override its default
//! [`BatchConfig`]. It can be built in code or loaded from JSON:
//!
//! ```rust
//! use ormgraph::config::{DialectKind, OrmConfig};
//!
//! let cfg = OrmConfig::from_json_str(r#"{ "dialect": "sql_server" }"#)?;
//! assert_eq!(cfg.dialect, DialectKind::SqlServer);
//! assert_eq!(cfg.batch_config().max_batch_size, 1000);
//! # Ok::<(), ormgraph::OrmGraphError>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{connection::Connection, errors::OrmGraphError, sql::Dialect, update::BatchConfig};

/// Database engine the generated SQL targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    /// SQLite; the only engine with a bundled [`Connection`].
    #[default]
    Sqlite,
    /// SQL Server; SQL generation only.
    SqlServer,
}

impl DialectKind {
    pub fn parse(name: &str) -> Result<Self, OrmGraphError> {
        match name.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DialectKind::Sqlite),
            "sqlserver" | "sql_server" | "mssql" => Ok(DialectKind::SqlServer),
            other => Err(OrmGraphError::config(format!("unknown dialect '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrmConfig {
    #[serde(default)]
    pub dialect: DialectKind,

    /// Replaces the dialect's default batching limits when set.
    #[serde(default)]
    pub batching: Option<BatchConfig>,

    /// Log parameter values alongside statements.
    ///
    /// **Default:** `false`. Values may hold personal data.
    #[serde(default)]
    pub sensitive_data_logging: bool,
}

impl OrmConfig {
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn sqlite() -> Self {
        Self::new(DialectKind::Sqlite)
    }

    pub fn sql_server() -> Self {
        Self::new(DialectKind::SqlServer)
    }

    pub fn from_json_str(text: &str) -> Result<Self, OrmGraphError> {
        let cfg: OrmConfig =
            serde_json::from_str(text).map_err(|e| OrmGraphError::config(e.to_string()))?;
        cfg.check()?;
        Ok(cfg)
    }

    pub fn dialect(&self) -> Dialect {
        let dialect = match self.dialect {
            DialectKind::Sqlite => Dialect::sqlite(),
            DialectKind::SqlServer => Dialect::sql_server(),
        };
        match self.batching {
            Some(batching) => dialect.with_batching(batching),
            None => dialect,
        }
    }

    /// The override when present, else the dialect's default.
    pub fn batch_config(&self) -> BatchConfig {
        self.batching.unwrap_or_else(|| self.dialect().batch_config())
    }

    fn check(&self) -> Result<(), OrmGraphError> {
        if let Some(batching) = &self.batching {
            if batching.max_batch_size == 0 {
                return Err(OrmGraphError::config("max_batch_size must be at least 1"));
            }
            if batching.max_parameters == Some(0) {
                return Err(OrmGraphError::config("max_parameters must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Opens a connection for the configured dialect. `"memory"` (or `":memory:"`)
/// opens a private in-memory SQLite database.
pub fn open_connection<P: AsRef<Path>>(
    path: P,
    cfg: &OrmConfig,
) -> Result<Box<dyn Connection>, OrmGraphError> {
    match cfg.dialect {
        #[cfg(feature = "sqlite-backend")]
        DialectKind::Sqlite => {
            use crate::connection::SqliteConnection;

            let path = path.as_ref();
            let connection = if path == Path::new("memory") || path == Path::new(":memory:") {
                SqliteConnection::open_in_memory()?
            } else {
                SqliteConnection::open_path(path)?
            };
            Ok(Box::new(connection))
        }
        #[cfg(not(feature = "sqlite-backend"))]
        DialectKind::Sqlite => {
            let _ = path;
            Err(OrmGraphError::unsupported(
                "sqlite connections (built without sqlite-backend)",
            ))
        }
        DialectKind::SqlServer => {
            let _ = path;
            Err(OrmGraphError::unsupported("bundled SQL Server connection"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_override_wins() {
        let cfg = OrmConfig::from_json_str(
            r#"{ "dialect": "sql_server", "batching": { "max_batch_size": 5 } }"#,
        )
        .expect("config");
        assert_eq!(cfg.batch_config().max_batch_size, 5);
        assert_eq!(cfg.dialect().batch_config().max_batch_size, 5);
        assert_eq!(OrmConfig::sqlite().batch_config(), BatchConfig::singular());
    }

    #[test]
    fn test_invalid_documents_are_config_errors() {
        let err = OrmConfig::from_json_str("{ not json").expect_err("parse");
        assert!(matches!(err, OrmGraphError::ConfigError(_)));
        let err = OrmConfig::from_json_str(r#"{ "batching": { "max_batch_size": 0 } }"#)
            .expect_err("zero batch");
        assert!(matches!(err, OrmGraphError::ConfigError(_)));
    }

    #[test]
    fn test_open_connection_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("orm.db");
        let mut connection = open_connection(&path, &OrmConfig::sqlite()).expect("open");
        assert!(connection.is_open());
        connection
            .execute_script("CREATE TABLE t (id INTEGER PRIMARY KEY);")
            .expect("script");
        connection.close().expect("close");
        assert!(path.exists());
    }

    #[test]
    fn test_sql_server_has_no_bundled_connection() {
        let err = open_connection("memory", &OrmConfig::sql_server()).err().expect("unsupported");
        assert!(matches!(err, OrmGraphError::UnsupportedDialectFeature(_)));
    }
}
