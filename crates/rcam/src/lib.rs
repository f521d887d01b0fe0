pub mod geometry;
pub mod strategy;
pub mod tsp;

mod error;
mod job;
mod operation;
mod postprocessor;
mod source;
mod tool_library;
mod toolpath_generation;
mod types;

pub use error::CancelReason;
pub use geometry::{Curve, Mesh, OperationId, Path, Point3, Region, SourceId};
pub use job::*;
pub use operation::*;
pub use postprocessor::*;
pub use source::*;
pub use strategy::{Strategy, StrategyKind};
pub use tool_library::*;
pub use toolpath_generation::*;
pub use types::*;
