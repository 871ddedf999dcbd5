//! Utilities shared across database drivers.
//!
//! - [`connection`]: connection URL parsing and redaction
//! - [`tls`]: `sslmode` handling and the rustls connector

pub mod connection;
pub mod tls;

pub use connection::{redact_url, ConnectionUrl};
pub use tls::SslMode;

/// Split a declared type into its lowercase base name and any parenthesized
/// arguments: `"NUMERIC(10, 2)"` → `("numeric", Some("10, 2"))`.
pub(crate) fn split_type(data_type: &str) -> (String, Option<String>) {
    let t = data_type.trim();
    match t.find('(') {
        Some(open) => {
            let close = t.rfind(')').unwrap_or(t.len());
            let base = format!("{}{}", t[..open].trim(), t.get(close + 1..).unwrap_or(""));
            let args = t.get(open + 1..close).unwrap_or("").trim().to_string();
            (base.trim().to_ascii_lowercase(), Some(args))
        }
        None => (t.to_ascii_lowercase(), None),
    }
}
