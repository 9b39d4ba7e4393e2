//! Planning and applying changes.
//!
//! This module compares desired with actual state, lays out the resulting
//! operations in dependency order, and applies them one application at a time.

mod diff;
mod executor;
mod plan;

pub use diff::DiffPlanner;
pub use executor::{AppPhase, AppReport, ApplyExecutor, ApplyOutcome, FailedOp};
pub use plan::{ChangeOp, ChangeSet, DiffEntry, FieldDiff, FieldShape, Marker, OpKind};
