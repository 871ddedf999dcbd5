//! Plausible values per type category.
//!
//! Column-name heuristics (email, name, phone) only make output look
//! realistic; correctness comes from the key pools and unique sets.

use chrono::Duration;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::codec::TypeCategory;
use crate::core::schema::Column;
use crate::core::value::SqlValue;

use super::context::GeneratorContext;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Dennis", "Edsger", "Frances", "Grace", "Hedy", "Ivan",
    "John", "Ken", "Linus", "Margaret", "Niklaus", "Radia", "Sophie", "Tim", "Whitfield", "Yukihiro",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Berners", "Cerf", "Diffie", "Dijkstra", "Hamilton", "Hopper", "Kahn", "Knuth",
    "Lamarr", "Liskov", "Lovelace", "Perlman", "Ritchie", "Shannon", "Sutherland", "Thompson",
    "Torvalds", "Turing", "Wirth",
];

const WORDS: &[&str] = &[
    "alpha", "amber", "anchor", "basil", "beacon", "cedar", "cobalt", "delta", "ember", "fable",
    "garnet", "harbor", "indigo", "juniper", "kelp", "lumen", "maple", "nectar", "onyx", "pepper",
    "quartz", "raven", "sable", "tango", "umber", "velvet", "willow", "xenon", "yonder", "zephyr",
];

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;

#[derive(Clone, Copy)]
enum TextKind {
    Email,
    Name,
    Phone,
    Plain,
}

fn text_kind(column: &Column) -> TextKind {
    let name = column.name.to_ascii_lowercase();
    if name.contains("email") {
        TextKind::Email
    } else if name.contains("phone") {
        TextKind::Phone
    } else if name.contains("name") {
        TextKind::Name
    } else {
        TextKind::Plain
    }
}

fn pick<'a>(ctx: &mut GeneratorContext, list: &[&'a str]) -> &'a str {
    list.choose(&mut ctx.rng).copied().unwrap_or("value")
}

/// A random value for `column`. Enum columns draw from `domain`.
pub(crate) fn random_value(
    ctx: &mut GeneratorContext,
    column: &Column,
    category: TypeCategory,
    domain: Option<&[String]>,
) -> SqlValue {
    match category {
        TypeCategory::Boolean => SqlValue::Bool(ctx.rng.gen_bool(0.5)),
        TypeCategory::Integer => {
            let t = column.data_type.to_ascii_lowercase();
            let max = if t.starts_with("tinyint") {
                127
            } else if t.starts_with("smallint") || t.starts_with("int2") {
                32_000
            } else {
                100_000
            };
            SqlValue::Int(ctx.rng.gen_range(1..=max))
        }
        TypeCategory::Numeric => SqlValue::Decimal(Decimal::new(ctx.rng.gen_range(0..1_000_000), 2)),
        TypeCategory::Timestamp => {
            let offset = ctx.rng.gen_range(0..SECONDS_PER_YEAR);
            SqlValue::Timestamp((ctx.anchor - Duration::seconds(offset)).fixed_offset())
        }
        TypeCategory::Date => {
            let days = ctx.rng.gen_range(0..365);
            SqlValue::Date((ctx.anchor - Duration::days(days)).date_naive())
        }
        TypeCategory::Json => {
            let key = pick(ctx, WORDS);
            let value: u32 = ctx.rng.gen_range(1..1000);
            SqlValue::Json(serde_json::json!({ "key": key, "value": value }).to_string())
        }
        TypeCategory::Array => {
            let len = ctx.rng.gen_range(1..=3);
            let numeric = is_numeric_element(&column.data_type);
            let items: Vec<String> = (0..len)
                .map(|_| {
                    if numeric {
                        ctx.rng.gen_range(1..100).to_string()
                    } else {
                        pick(ctx, WORDS).to_string()
                    }
                })
                .collect();
            SqlValue::Array(format!("{{{}}}", items.join(",")))
        }
        TypeCategory::Enum => match domain {
            Some(values) if !values.is_empty() => values
                .choose(&mut ctx.rng)
                .map(|v| SqlValue::Text(v.clone()))
                .unwrap_or(SqlValue::Null),
            _ => SqlValue::Null,
        },
        TypeCategory::Uuid => SqlValue::Uuid(random_uuid(ctx)),
        TypeCategory::Text => {
            let text = match text_kind(column) {
                TextKind::Email => {
                    let first = pick(ctx, FIRST_NAMES);
                    let last = pick(ctx, LAST_NAMES);
                    let n: u32 = ctx.rng.gen_range(1..10_000);
                    format!("{}.{}{}@example.com", first, last, n).to_ascii_lowercase()
                }
                TextKind::Name => format!("{} {}", pick(ctx, FIRST_NAMES), pick(ctx, LAST_NAMES)),
                TextKind::Phone => format!(
                    "+1-555-{:03}-{:04}",
                    ctx.rng.gen_range(100..1000),
                    ctx.rng.gen_range(0..10_000)
                ),
                TextKind::Plain => {
                    let len = ctx.rng.gen_range(2..=4);
                    (0..len).map(|_| pick(ctx, WORDS)).collect::<Vec<_>>().join(" ")
                }
            };
            SqlValue::Text(fit_length(text, column.max_length))
        }
    }
}

/// The `n`th deterministic candidate for a column whose values must be
/// distinct. Candidates for different `n` never collide. `None` for
/// categories with a finite domain, and for bounded text once `n` no longer
/// fits the column's length.
pub(crate) fn unique_candidate(
    ctx: &mut GeneratorContext,
    column: &Column,
    category: TypeCategory,
    n: usize,
) -> Option<SqlValue> {
    let n = n as i64 + 1;
    let value = match category {
        TypeCategory::Boolean | TypeCategory::Enum => return None,
        TypeCategory::Integer => SqlValue::Int(n),
        TypeCategory::Numeric => SqlValue::Decimal(Decimal::from(n)),
        TypeCategory::Timestamp => {
            SqlValue::Timestamp((ctx.anchor - Duration::minutes(n)).fixed_offset())
        }
        TypeCategory::Date => SqlValue::Date((ctx.anchor - Duration::days(n)).date_naive()),
        TypeCategory::Json => SqlValue::Json(serde_json::json!({ "id": n }).to_string()),
        TypeCategory::Array => SqlValue::Array(format!("{{{}}}", n)),
        TypeCategory::Uuid => SqlValue::Uuid(random_uuid(ctx)),
        TypeCategory::Text => {
            let idx = n as usize;
            let first = FIRST_NAMES[idx % FIRST_NAMES.len()];
            let last = LAST_NAMES[(idx / FIRST_NAMES.len()) % LAST_NAMES.len()];
            let text = match text_kind(column) {
                TextKind::Email => format!("{}.{}.{}@example.com", first, last, n).to_ascii_lowercase(),
                TextKind::Name => format!("{} {} {}", first, last, n),
                TextKind::Phone => format!("+1-555-{:07}", n),
                TextKind::Plain => format!("{}_{}", WORDS[idx % WORDS.len()], n),
            };
            match column.max_length {
                Some(max) if text.chars().count() > max as usize => {
                    let short = base36((n - 1) as u64);
                    if short.len() > max as usize {
                        return None;
                    }
                    SqlValue::Text(short)
                }
                _ => SqlValue::Text(text),
            }
        }
    };
    Some(value)
}

/// Every value of a finite-domain category, in declaration order.
pub(crate) fn finite_domain(category: TypeCategory, domain: Option<&[String]>) -> Vec<SqlValue> {
    match category {
        TypeCategory::Boolean => vec![SqlValue::Bool(true), SqlValue::Bool(false)],
        TypeCategory::Enum => domain
            .unwrap_or_default()
            .iter()
            .map(|v| SqlValue::Text(v.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn random_uuid(ctx: &mut GeneratorContext) -> Uuid {
    uuid::Builder::from_random_bytes(ctx.rng.gen()).into_uuid()
}

fn is_numeric_element(data_type: &str) -> bool {
    let element = data_type.trim_end_matches("[]").trim_start_matches('_');
    matches!(
        TypeCategory::of(element),
        TypeCategory::Integer | TypeCategory::Numeric
    )
}

fn fit_length(text: String, max_length: Option<u32>) -> String {
    match max_length {
        Some(max) if text.chars().count() > max as usize => text.chars().take(max as usize).collect(),
        _ => text,
    }
}

/// Text form used for uniqueness checks.
pub(crate) fn unique_key(value: &SqlValue) -> String {
    crate::codec::encode(value, TypeCategory::Text)
}
