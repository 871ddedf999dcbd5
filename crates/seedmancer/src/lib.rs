//! # seedmancer
//!
//! Portable schema and data snapshots for PostgreSQL and MySQL.
//!
//! A snapshot is a directory holding `schema.json` and one CSV row file per
//! table. This library provides:
//!
//! - **Catalog introspection** normalizing both engines into one [`Schema`]
//! - **Dependency ordering** of tables that tolerates foreign key cycles
//! - **DDL synthesis** per engine, including cross-engine type mapping
//! - **A type codec** for lossless row-file text (timestamps, JSON, arrays)
//! - **Restore** in phases: enums, tables, constraints, then data
//! - **Synthetic data** that satisfies keys and foreign keys offline
//!
//! ## Example
//!
//! ```rust,no_run
//! use seedmancer::{connect_target, RestoreOptions, RestoreOrchestrator, SnapshotReader};
//!
//! #[tokio::main]
//! async fn main() -> seedmancer::Result<()> {
//!     let snapshot = SnapshotReader::open(".seedmancer/databases/shop/unversioned")?;
//!     let mut target = connect_target("postgres://localhost/shop_copy").await?;
//!     let report = RestoreOrchestrator::new(target.as_mut(), RestoreOptions::default())
//!         .run(&snapshot)
//!         .await?;
//!     target.close().await;
//!     println!("Restored {} rows", report.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod order;
pub mod snapshot;
pub mod transport;

// Re-exports for convenient access
pub use crate::core::{
    Batch, Column, ColumnDefault, Dialect, Engine, EnumType, ForeignKey, Row, Schema,
    SourceReader, SqlValue, Table, TargetWriter,
};
pub use config::{Config, LoadedConfig};
pub use drivers::{connect_source, connect_target, DialectImpl};
pub use error::{Result, SnapshotError};
pub use generator::{generate, generate_snapshot, GenerateOptions, GenerateReport, GeneratorContext};
pub use orchestrator::{ExportReport, Exporter, RestoreOptions, RestoreOrchestrator, RestoreReport};
pub use order::{dependency_order, TableOrder};
pub use snapshot::{SnapshotReader, SnapshotWriter};
pub use transport::{DirectoryTransport, SnapshotTransport};
