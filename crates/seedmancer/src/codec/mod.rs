//! Type codec: row values to and from row-file text.
//!
//! Every cell in a snapshot CSV is produced by [`encode`] and read back by
//! [`decode`], both driven by the column's [`TypeCategory`]. Decoding never
//! fails: a value that cannot be coerced to its category is kept as text and
//! left for the target database to accept or reject.

pub mod array;
pub mod json;
pub mod timestamp;

use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::core::schema::Column;
use crate::core::value::SqlValue;

use self::json::JsonRepair;
use self::timestamp::ParsedTime;

/// Token written for absent values.
pub const NULL_TOKEN: &str = "NULL";

/// Coarse classification of a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Boolean,
    Integer,
    Numeric,
    Timestamp,
    Date,
    Json,
    Array,
    Enum,
    Uuid,
    Text,
}

impl TypeCategory {
    /// Classify a declared type string from either engine.
    pub fn of(data_type: &str) -> Self {
        let t = data_type.trim().to_ascii_lowercase();
        let base = t.split('(').next().unwrap_or(&t).trim();

        if t.ends_with("[]") || base == "array" || base.starts_with('_') {
            return TypeCategory::Array;
        }
        match base {
            "enum" => TypeCategory::Enum,
            "json" | "jsonb" => TypeCategory::Json,
            "bool" | "boolean" => TypeCategory::Boolean,
            "uuid" => TypeCategory::Uuid,
            "date" => TypeCategory::Date,
            "smallint" | "integer" | "int" | "bigint" | "tinyint" | "mediumint" | "int2"
            | "int4" | "int8" | "serial" | "bigserial" | "smallserial" | "serial4"
            | "serial8" | "year" => TypeCategory::Integer,
            "numeric" | "decimal" | "real" | "float" | "double" | "double precision"
            | "float4" | "float8" | "money" => TypeCategory::Numeric,
            _ if base.starts_with("int ") || base.starts_with("bigint ") => TypeCategory::Integer,
            _ if base.starts_with("timestamp") || base.starts_with("datetime") => {
                TypeCategory::Timestamp
            }
            _ => TypeCategory::Text,
        }
    }

    /// Classify a column, honouring its enum reference.
    pub fn for_column(column: &Column) -> Self {
        if column.enum_name.is_some() {
            return TypeCategory::Enum;
        }
        Self::of(&column.data_type)
    }
}

/// Encode a value as row-file text.
pub fn encode(value: &SqlValue, category: TypeCategory) -> String {
    match value {
        SqlValue::Null => NULL_TOKEN.to_string(),
        SqlValue::Bool(b) => b.to_string(),
        SqlValue::Int(i) => i.to_string(),
        // Exponent form never parses as an integer or a decimal.
        SqlValue::Float(f) => format!("{:e}", f),
        SqlValue::Decimal(d) => d.to_string(),
        SqlValue::Uuid(u) => u.hyphenated().to_string(),
        SqlValue::Timestamp(ts) => timestamp::format_timestamp(ts),
        SqlValue::Date(d) => timestamp::format_date(d),
        SqlValue::Array(s) => array::to_native(s),
        SqlValue::Text(s) if category == TypeCategory::Array => array::to_native(s),
        SqlValue::Text(s) | SqlValue::Json(s) => s.clone(),
    }
}

/// True for the three spellings of an absent value.
pub fn is_null_token(text: &str) -> bool {
    text.is_empty() || text == NULL_TOKEN || text == "null"
}

/// Decode row-file text into a value for `category`.
pub fn decode(text: &str, category: TypeCategory) -> SqlValue {
    if is_null_token(text) {
        return SqlValue::Null;
    }

    match category {
        TypeCategory::Boolean => match parse_bool(text) {
            Some(b) => SqlValue::Bool(b),
            None => keep_text(text, category),
        },
        TypeCategory::Integer | TypeCategory::Numeric => decode_number(text, category),
        TypeCategory::Timestamp => match timestamp::parse_timestamp(text) {
            Some(ParsedTime::Instant(ts)) => SqlValue::Timestamp(ts),
            Some(ParsedTime::Date(d)) => SqlValue::Timestamp(timestamp::date_to_instant(d)),
            None => keep_text(text, category),
        },
        TypeCategory::Date => match timestamp::parse_timestamp(text) {
            Some(ParsedTime::Date(d)) => SqlValue::Date(d),
            Some(ParsedTime::Instant(ts)) => SqlValue::Timestamp(ts),
            None => keep_text(text, category),
        },
        TypeCategory::Json => {
            let (repaired, step) = json::repair_json(text);
            if step == JsonRepair::Raw {
                debug!("JSON repair failed, passing text through: {:.60}", text);
            }
            SqlValue::Json(repaired)
        }
        TypeCategory::Array => SqlValue::Array(array::to_native(text)),
        TypeCategory::Uuid => match Uuid::parse_str(text.trim()) {
            Ok(u) => SqlValue::Uuid(u),
            Err(_) => keep_text(text, category),
        },
        TypeCategory::Enum | TypeCategory::Text => SqlValue::Text(text.to_string()),
    }
}

/// Case-insensitive boolean words.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn decode_number(text: &str, category: TypeCategory) -> SqlValue {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return SqlValue::Int(i);
    }
    if let Ok(d) = trimmed.parse::<Decimal>() {
        return SqlValue::Decimal(d);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return SqlValue::Float(f);
    }
    keep_text(text, category)
}

fn keep_text(text: &str, category: TypeCategory) -> SqlValue {
    debug!("Keeping {:?} value as text: {:.60}", category, text);
    SqlValue::Text(text.to_string())
}
