//! Per-run generator state.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::value::SqlValue;

/// Options for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Rows per table.
    pub rows: usize,
    /// Chance of NULL for a nullable column that is not a key.
    pub null_probability: f64,
    /// Seed for reproducible output; a random seed is drawn when absent.
    pub seed: Option<u64>,
    /// Random candidates tried for a unique column before the suffix fallback.
    pub max_unique_attempts: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            rows: 10,
            null_probability: 0.1,
            seed: None,
            max_unique_attempts: 1_000,
        }
    }
}

impl From<&crate::config::GenerateConfig> for GenerateOptions {
    fn from(config: &crate::config::GenerateConfig) -> Self {
        Self {
            rows: config.rows,
            null_probability: config.null_probability,
            seed: config.seed,
            max_unique_attempts: config.max_unique_attempts,
        }
    }
}

/// State shared across the tables of one run and dropped with it.
///
/// Key pools hold every pre-generated key value by `table.column`, so foreign
/// key columns can draw from them. Unique sets hold the encoded values already
/// emitted for each `table.column` that must stay distinct.
pub struct GeneratorContext {
    pub(crate) rng: StdRng,
    pub(crate) options: GenerateOptions,
    /// Fixed "now" that generated timestamps are offset from.
    pub(crate) anchor: DateTime<Utc>,
    pools: HashMap<String, Vec<SqlValue>>,
    unique: HashMap<String, HashSet<String>>,
}

impl GeneratorContext {
    pub fn new(options: GenerateOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        // Seeded runs must not depend on the wall clock.
        let anchor = match options.seed {
            Some(_) => Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
            None => None,
        }
        .unwrap_or_else(Utc::now);

        Self {
            rng,
            options,
            anchor,
            pools: HashMap::new(),
            unique: HashMap::new(),
        }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub(crate) fn set_pool(&mut self, table: &str, column: &str, values: Vec<SqlValue>) {
        self.pools.insert(pool_key(table, column), values);
    }

    /// Pre-generated values for `table.column`.
    pub fn pool(&self, table: &str, column: &str) -> Option<&[SqlValue]> {
        self.pools
            .get(&pool_key(table, column))
            .map(Vec::as_slice)
            .filter(|p| !p.is_empty())
    }

    /// Record `encoded` for `table.column`; false if it was already taken.
    pub(crate) fn claim(&mut self, table: &str, column: &str, encoded: String) -> bool {
        self.unique
            .entry(pool_key(table, column))
            .or_default()
            .insert(encoded)
    }

    pub(crate) fn is_taken(&self, table: &str, column: &str, encoded: &str) -> bool {
        self.unique
            .get(&pool_key(table, column))
            .is_some_and(|set| set.contains(encoded))
    }
}

fn pool_key(table: &str, column: &str) -> String {
    format!("{}.{}", table, column)
}
