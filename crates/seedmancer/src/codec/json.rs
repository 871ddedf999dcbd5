//! JSON text repair ladder.
//!
//! Row files written by hand or by older exporters often hold
//! JavaScript-style object text (`{'a':1}`, `{a: 1}`). The ladder is:
//! strict parse, single-quote substitution, bracket-aware re-quoting, and
//! finally the raw text unchanged. Nothing beyond these steps is guessed.

/// Which ladder step produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRepair {
    Valid,
    QuotesSubstituted,
    Requoted,
    Raw,
}

pub fn is_valid_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

/// Run the repair ladder over `text`.
pub fn repair_json(text: &str) -> (String, JsonRepair) {
    if is_valid_json(text) {
        return (text.to_string(), JsonRepair::Valid);
    }

    if text.contains('\'') && !text.contains('"') {
        let substituted = text.replace('\'', "\"");
        if is_valid_json(&substituted) {
            return (substituted, JsonRepair::QuotesSubstituted);
        }
    }

    let requoted = requote(text);
    if is_valid_json(&requoted) {
        return (requoted, JsonRepair::Requoted);
    }

    (text.to_string(), JsonRepair::Raw)
}

/// Convert single-quoted strings to double-quoted ones and quote bare words
/// (object keys and unquoted scalar values), leaving numbers, `true`,
/// `false`, `null`, and structure untouched.
fn requote(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                out.push('"');
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    out.push(ch);
                    i += 1;
                    if ch == '\\' && i < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    } else if ch == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    i += 1;
                    match ch {
                        '\\' if i < chars.len() && chars[i] == '\'' => {
                            out.push('\'');
                            i += 1;
                        }
                        '\\' if i < chars.len() => {
                            out.push('\\');
                            out.push(chars[i]);
                            i += 1;
                        }
                        '"' => out.push_str("\\\""),
                        '\'' => break,
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '$' | '-' | '.'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if matches!(word.as_str(), "true" | "false" | "null") {
                    out.push_str(&word);
                } else {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_valid_json_passes_through_unchanged() {
        let (out, step) = repair_json(r#"{"a": [1, 2], "b": {"c": null}}"#);
        assert_eq!(step, JsonRepair::Valid);
        assert_eq!(out, r#"{"a": [1, 2], "b": {"c": null}}"#);
    }

    #[test]
    fn test_single_quotes_substituted() {
        let (out, step) = repair_json("{'a':1}");
        assert_eq!(step, JsonRepair::QuotesSubstituted);
        assert_eq!(parsed(&out), json!({"a": 1}));
    }

    #[test]
    fn test_bare_keys_requoted() {
        let (out, step) = repair_json("{a: 1, b: 'x', c: true, d: [1, 'two']}");
        assert_eq!(step, JsonRepair::Requoted);
        assert_eq!(parsed(&out), json!({"a": 1, "b": "x", "c": true, "d": [1, "two"]}));
    }

    #[test]
    fn test_mixed_quotes_requoted() {
        let (out, step) = repair_json(r#"{'name': "O'Neil", 'tags': ['x']}"#);
        assert_eq!(step, JsonRepair::Requoted);
        assert_eq!(parsed(&out), json!({"name": "O'Neil", "tags": ["x"]}));
    }

    #[test]
    fn test_single_quoted_string_with_double_quote_inside() {
        let out = requote(r#"{k: 'say "hi"'}"#);
        assert_eq!(parsed(&out), json!({"k": "say \"hi\""}));
    }

    #[test]
    fn test_unrepairable_passes_raw() {
        let (out, step) = repair_json("{{not json");
        assert_eq!(step, JsonRepair::Raw);
        assert_eq!(out, "{{not json");
    }
}
