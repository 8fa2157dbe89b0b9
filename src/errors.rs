use thiserror::Error;

/// Error type for every fallible ormgraph operation.
#[derive(Debug, Error)]
pub enum OrmGraphError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid model: {}", .0.join("; "))]
    InvalidModel(Vec<String>),
    #[error("cyclic dependency between: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),
    #[error("no include registered for context '{0}'")]
    DanglingIncludeChain(String),
    #[error("unsupported dialect feature: {0}")]
    UnsupportedDialectFeature(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("execution error: {0}")]
    ExecutionError(String),
    #[error("concurrency conflict: expected {expected} row(s) affected, got {actual}")]
    ConcurrencyConflict { expected: usize, actual: usize },
    #[error("config error: {0}")]
    ConfigError(String),
}

impl OrmGraphError {
    pub fn invalid_argument<T: Into<String>>(msg: T) -> Self {
        OrmGraphError::InvalidArgument(msg.into())
    }

    pub fn invalid_model<T: Into<String>>(msg: T) -> Self {
        OrmGraphError::InvalidModel(vec![msg.into()])
    }

    pub fn cyclic<I, T>(participants: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        OrmGraphError::CyclicDependency(participants.into_iter().map(Into::into).collect())
    }

    pub fn dangling_include<T: Into<String>>(context: T) -> Self {
        OrmGraphError::DanglingIncludeChain(context.into())
    }

    pub fn unsupported<T: Into<String>>(msg: T) -> Self {
        OrmGraphError::UnsupportedDialectFeature(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        OrmGraphError::NotFound(msg.into())
    }

    pub fn connection<T: Into<String>>(msg: T) -> Self {
        OrmGraphError::ConnectionError(msg.into())
    }

    pub fn execution<T: Into<String>>(msg: T) -> Self {
        OrmGraphError::ExecutionError(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        OrmGraphError::ConfigError(msg.into())
    }

    /// Violations carried by an [`OrmGraphError::InvalidModel`], empty for other variants.
    pub fn violations(&self) -> &[String] {
        match self {
            OrmGraphError::InvalidModel(violations) => violations,
            _ => &[],
        }
    }
}

pub(crate) fn require_name(kind: &str, name: &str) -> Result<(), OrmGraphError> {
    if name.trim().is_empty() {
        return Err(OrmGraphError::invalid_argument(format!(
            "{kind} name must be set"
        )));
    }
    Ok(())
}
