//! Entity metadata graph, convention pipeline and relational SQL generation.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod algo;
pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod conventions;
pub mod errors;
pub mod graph;
pub mod metadata;
pub mod naming;
pub mod query;
pub mod sql;
pub mod update;
pub mod valuegen;

pub use crate::cache::ValueGeneratorCache;
pub use crate::config::{DialectKind, OrmConfig, open_connection};
pub use crate::connection::{Connection, Parameter, Row};
#[cfg(feature = "sqlite-backend")]
pub use crate::connection::SqliteConnection;
pub use crate::conventions::{Convention, ConventionEvent, ConventionPoint, ConventionSet, ModelBuilder};
pub use crate::errors::OrmGraphError;
pub use crate::graph::{ForeignKeyGraph, GraphView, NavigationGraph};
pub use crate::metadata::{EntityId, Model, PropertyId, ValueType};
pub use crate::naming::UniqueNamer;
pub use crate::query::{IncludePipeline, Query, QueryCompiler};
pub use crate::sql::{Dialect, SqlExpression, SqlGenerator, SqlValue};
pub use crate::update::{BatchConfig, BatchExecutor, CommandPlanner, EntityEntry, EntityState, SaveResult};
pub use crate::valuegen::{SequentialGuidGenerator, SequentialNumberGenerator, ValueGenerator};
