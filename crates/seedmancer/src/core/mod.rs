//! Core abstractions for engine-agnostic snapshot work.
//!
//! - [`schema`]: enums, tables, columns, foreign keys, and defaults
//! - [`value`]: owned SQL values and row batches
//! - [`identifier`]: identifier validation and per-engine quoting
//! - [`traits`]: readers, writers, and DDL dialects
//!
//! Driver modules (`drivers/postgres`, `drivers/mysql`) implement the traits;
//! everything above them works against the traits only.

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use identifier::{MysqlQuoter, PgQuoter, Quoter};
pub use schema::{Column, ColumnDefault, Engine, EnumType, ForeignKey, Schema, Table};
pub use traits::{
    ConstraintOutcome, Dialect, ReadOptions, SourceReader, TargetWriter, TypeMapping,
    WriteOutcome,
};
pub use value::{Batch, Row, SqlValue};
