//! umv - mass file management through your text editor
//!
//! This library turns a directory tree into an editable text listing, one
//! file or archive member per line, and reconciles the user's edits back
//! into filesystem operations: renames, moves, deletions, and archive
//! extraction. Conflicting operations (overwrites, swaps, collisions) are
//! ordered into a safe execution plan before anything touches the disk.

pub mod archive;
pub mod cli;
pub mod config;
pub mod editor;
pub mod entry;
pub mod execute;
pub mod listing;
pub mod output;
pub mod plan;
pub mod reconcile;
pub mod scan;

pub use config::{CompiledFilters, Config, ConfigError};
pub use entry::{Entry, EntryId, Origin};
pub use execute::{ExecutionReport, Executor};
pub use listing::{EditedLine, ListingError, decode, encode};
pub use plan::{Plan, PlanBuilder, PlanError, PlanStep, StepAction};
pub use reconcile::{CaseSensitivity, Operation, OperationKind, ReconcileError, Reconciler};
pub use scan::Scanner;

pub use cli::{RunOptions, run};
