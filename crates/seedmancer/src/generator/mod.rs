//! Synthetic data generation without a live database.
//!
//! Two passes over the schema:
//!
//! 1. Every primary key column, and every column some foreign key points at,
//!    gets its full set of values up front, stored in the run's
//!    [`GeneratorContext`] under `table.column`.
//! 2. Each table's rows are built column by column. Foreign key columns draw
//!    from the referenced pool (wrapping by row index), key columns take their
//!    own pool value, unique columns go through a bounded retry loop, and the
//!    rest get plausible random values.
//!
//! Enum columns without a usable value list get placeholder members on a copy
//! of the schema; the input schema is never modified.

mod context;
mod values;

pub use context::{GenerateOptions, GeneratorContext};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::TypeCategory;
use crate::core::schema::{Column, EnumType, Schema, Table};
use crate::core::value::{Row, SqlValue};
use crate::error::Result;
use crate::order::dependency_order;
use crate::snapshot::{SnapshotWriter, TableCount};

use self::values::{finite_domain, random_value, unique_candidate, unique_key};

/// Members given to enum columns that carry no value list.
const PLACEHOLDER_ENUM_VALUES: &[&str] = &["option_a", "option_b", "option_c"];

/// Generated rows for one table.
#[derive(Debug, Clone)]
pub struct GeneratedTable {
    pub name: String,
    pub rows: Vec<Row>,
}

/// Output of one generation run.
#[derive(Debug, Clone)]
pub struct GeneratedData {
    /// The input schema plus any synthesized enums.
    pub schema: Schema,
    /// Tables in dependency order.
    pub tables: Vec<GeneratedTable>,
}

impl GeneratedData {
    pub fn table(&self, name: &str) -> Option<&GeneratedTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Summary of [`generate_snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub output_dir: PathBuf,
    pub seed: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub tables: Vec<TableCount>,
    pub rows_total: u64,
}

/// Generate rows for every table in `schema`.
pub fn generate(schema: &Schema, ctx: &mut GeneratorContext) -> GeneratedData {
    let schema = synthesize_enums(schema);
    let order = dependency_order(&schema.tables);
    for edge in &order.broken_edges {
        debug!(
            "Cycle through {}.{} -> {}; pool order may wrap",
            edge.from_table, edge.column, edge.to_table
        );
    }

    let tables: Vec<&Table> = order
        .tables
        .iter()
        .filter_map(|name| schema.table(name))
        .collect();

    // Pass 1: key pools.
    for table in &tables {
        for column in table
            .columns
            .iter()
            .filter(|c| c.is_primary || schema.is_referenced(&table.name, &c.name))
        {
            let pool = build_pool(ctx, &schema, table, column);
            ctx.set_pool(&table.name, &column.name, pool);
        }
    }

    // Pass 2: rows.
    let rows = ctx.options.rows;
    let generated = tables
        .iter()
        .map(|table| {
            let rows = (0..rows)
                .map(|i| {
                    table
                        .columns
                        .iter()
                        .map(|column| column_value(ctx, &schema, table, column, i))
                        .collect()
                })
                .collect();
            GeneratedTable {
                name: table.name.clone(),
                rows,
            }
        })
        .collect();

    GeneratedData {
        tables: generated,
        schema,
    }
}

/// Generate a dataset and write it as a snapshot directory.
pub fn generate_snapshot(
    schema: &Schema,
    options: GenerateOptions,
    dir: &Path,
) -> Result<GenerateReport> {
    let started_at = Utc::now();
    let seed = options.seed;
    let mut ctx = GeneratorContext::new(options);
    info!(
        "Generating {} rows for each of {} tables",
        ctx.options().rows,
        schema.tables.len()
    );

    let data = generate(schema, &mut ctx);

    let writer = SnapshotWriter::create(dir)?;
    writer.write_schema(&data.schema)?;
    let mut tables = Vec::with_capacity(data.tables.len());
    for generated in &data.tables {
        let Some(table) = data.schema.table(&generated.name) else {
            continue;
        };
        let mut out = writer.table_writer(table)?;
        for row in &generated.rows {
            out.write_row(row)?;
        }
        let rows = out.finish()?;
        debug!("{}: {} rows", table.name, rows);
        tables.push(TableCount {
            table: table.name.clone(),
            rows,
        });
    }

    let completed_at = Utc::now();
    let report = GenerateReport {
        output_dir: dir.to_path_buf(),
        seed,
        started_at,
        completed_at,
        duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        rows_total: tables.iter().map(|t| t.rows).sum(),
        tables,
    };
    info!(
        "Generated {} rows across {} tables in {}",
        report.rows_total,
        report.tables.len(),
        dir.display()
    );
    Ok(report)
}

/// Copy of `schema` where every enum column has a resolvable value list.
fn synthesize_enums(schema: &Schema) -> Schema {
    let mut out = schema.clone();
    for table in &mut out.tables {
        for column in &mut table.columns {
            if TypeCategory::for_column(column) != TypeCategory::Enum
                || schema.enum_values(column).is_some_and(|v| !v.is_empty())
            {
                continue;
            }
            let name = column
                .enum_name
                .clone()
                .unwrap_or_else(|| format!("{}_{}_enum", table.name, column.name));
            let values: Vec<String> = PLACEHOLDER_ENUM_VALUES.iter().map(|v| v.to_string()).collect();
            warn!(
                "Enum column {}.{} has no members; using placeholders in {}",
                table.name, column.name, name
            );
            column.enum_name = Some(name.clone());
            column.values = Some(values.clone());
            if !out.enums.iter().any(|e| e.name == name) {
                out.enums.push(EnumType { name, values });
            }
        }
    }
    out
}

fn build_pool(
    ctx: &mut GeneratorContext,
    schema: &Schema,
    table: &Table,
    column: &Column,
) -> Vec<SqlValue> {
    let rows = ctx.options.rows;
    // A key that is itself a foreign key reuses the referenced pool.
    if let Some(fk) = &column.foreign_key {
        if let Some(parent) = ctx.pool(&fk.table, &fk.column) {
            let pool: Vec<SqlValue> = (0..rows).map(|i| parent[i % parent.len()].clone()).collect();
            for value in &pool {
                ctx.claim(&table.name, &column.name, unique_key(value));
            }
            return pool;
        }
    }
    let category = TypeCategory::for_column(column);
    let domain = schema.enum_values(column).map(<[String]>::to_vec);
    debug!("Pre-generating {} keys for {}.{}", rows, table.name, column.name);
    (0..rows)
        .map(|i| {
            // Sequence-like keys first so integer keys come out as 1..=rows.
            if let Some(value) = unique_candidate(ctx, column, category, i) {
                if ctx.claim(&table.name, &column.name, unique_key(&value)) {
                    return value;
                }
            }
            unique_value(ctx, table, column, category, domain.as_deref(), i)
        })
        .collect()
}

fn column_value(
    ctx: &mut GeneratorContext,
    schema: &Schema,
    table: &Table,
    column: &Column,
    i: usize,
) -> SqlValue {
    if let Some(fk) = &column.foreign_key {
        if let Some(pool) = ctx.pool(&fk.table, &fk.column) {
            return pool[i % pool.len()].clone();
        }
    }
    if let Some(pool) = ctx.pool(&table.name, &column.name) {
        return pool[i % pool.len()].clone();
    }

    let category = TypeCategory::for_column(column);
    let domain = schema.enum_values(column);
    if column.requires_unique() {
        return unique_value(ctx, table, column, category, domain, i);
    }
    if column.nullable && ctx.rng.gen_bool(ctx.options.null_probability.clamp(0.0, 1.0)) {
        return SqlValue::Null;
    }
    random_value(ctx, column, category, domain)
}

/// Random candidates first, then deterministic ones starting at the row
/// index, then any unused member of a finite domain. Only when all of those
/// are taken is a duplicate accepted, so the run terminates.
fn unique_value(
    ctx: &mut GeneratorContext,
    table: &Table,
    column: &Column,
    category: TypeCategory,
    domain: Option<&[String]>,
    i: usize,
) -> SqlValue {
    let attempts = ctx.options.max_unique_attempts;
    for _ in 0..attempts {
        let value = random_value(ctx, column, category, domain);
        if ctx.claim(&table.name, &column.name, unique_key(&value)) {
            return value;
        }
    }

    let upward = i..i.saturating_add(attempts.max(1));
    for n in upward.chain(0..i.min(attempts)) {
        let Some(value) = unique_candidate(ctx, column, category, n) else {
            continue;
        };
        if ctx.claim(&table.name, &column.name, unique_key(&value)) {
            return value;
        }
    }

    for value in finite_domain(category, domain) {
        if ctx.claim(&table.name, &column.name, unique_key(&value)) {
            return value;
        }
    }

    warn!(
        "No distinct value left for {}.{} at row {}; emitting a duplicate",
        table.name, column.name, i
    );
    random_value(ctx, column, category, domain)
}
