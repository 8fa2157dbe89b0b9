//! Translation of tracked changes into ordered, batched modification commands.

pub mod batch;
pub mod command;
pub mod entry;
pub mod executor;
pub mod planner;
pub mod sql;

pub use batch::{BatchConfig, BatchFactory, CommandBatch};
pub use command::{ColumnModification, ModificationCommand, ParameterNameGenerator};
pub use entry::{EntityEntry, EntityState};
pub use executor::{BatchExecutor, PropagatedValue, SaveResult};
pub use planner::CommandPlanner;
pub use sql::{CommandSql, UpdateSqlGenerator};
