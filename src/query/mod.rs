//! Request interpretation: parameter validation, mode resolution, plan
//! compilation and SQL rendering.

pub mod compiler;
pub mod params;
pub mod resolver;
pub mod sql;
pub mod timezone;

pub use compiler::{compile, compile_export, CompiledQuery, QueryPlan};
pub use params::{ExportParams, ReadParams};
pub use resolver::{resolve, ResolvedMode};
pub use timezone::DisplayZone;
