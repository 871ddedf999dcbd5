//! Operation drivers: export a database to a snapshot, restore a snapshot
//! into a database.

mod export;
mod restore;

pub use export::{ExportReport, Exporter};
pub use restore::{
    FailedTable, RestoreOptions, RestoreOrchestrator, RestorePhase, RestoreReport,
    SkippedConstraint, SkippedRow,
};
