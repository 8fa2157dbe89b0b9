//! Include annotations and query compilation into select expressions.

pub mod compiler;
pub mod include;

pub use compiler::{
    CollectionSelect, CompiledQuery, FetchNode, FetchPlan, Query, QueryCompiler, QueryFilter,
};
pub use include::{IncludeAnnotation, IncludeNode, IncludePipeline};
