//! Array text in PostgreSQL literal syntax (`{a,"b c",NULL}`).
//!
//! Row files always carry the native literal. JSON-array text is converted
//! into it, a bare scalar becomes a one-element array, and text that parses
//! as neither falls back to a comma split that respects quoted substrings.

use serde_json::Value;

/// One element of a parsed native array literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElement {
    Null,
    Text { value: String, quoted: bool },
    Nested(Vec<ArrayElement>),
}

/// Normalize array text into native literal syntax.
pub fn to_native(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed.to_string();
    }

    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        if let Some(Value::Array(items)) = parse_json_array(trimmed) {
            return render_json_items(&items);
        }
        let inner = &trimmed[1..trimmed.len() - 1];
        let elements: Vec<String> = split_outside_quotes(inner)
            .into_iter()
            .map(|part| quote_element(strip_quotes(part.trim())))
            .collect();
        return format!("{{{}}}", elements.join(","));
    }

    format!("{{{}}}", quote_element(trimmed))
}

/// Convert a native literal into JSON array text, for engines that store
/// arrays as JSON. Unquoted numeric and boolean elements become JSON
/// numbers and booleans.
pub fn native_to_json(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(elements) = parse_native(trimmed) {
        return Value::Array(elements.iter().map(element_to_json).collect()).to_string();
    }
    if let Some(Value::Array(_)) = parse_json_array(trimmed) {
        return trimmed.to_string();
    }
    Value::Array(vec![Value::String(trimmed.to_string())]).to_string()
}

/// Parse a native array literal. Returns `None` if `text` is not one.
pub fn parse_native(text: &str) -> Option<Vec<ArrayElement>> {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut pos = 0;
    let elements = parse_level(&chars, &mut pos)?;
    if pos == chars.len() {
        Some(elements)
    } else {
        None
    }
}

fn parse_level(chars: &[char], pos: &mut usize) -> Option<Vec<ArrayElement>> {
    if chars.get(*pos) != Some(&'{') {
        return None;
    }
    *pos += 1;
    let mut elements = Vec::new();

    skip_spaces(chars, pos);
    if chars.get(*pos) == Some(&'}') {
        *pos += 1;
        return Some(elements);
    }

    loop {
        skip_spaces(chars, pos);
        match chars.get(*pos)? {
            '{' => elements.push(ArrayElement::Nested(parse_level(chars, pos)?)),
            '"' => {
                *pos += 1;
                let mut value = String::new();
                loop {
                    match chars.get(*pos)? {
                        '\\' => {
                            value.push(*chars.get(*pos + 1)?);
                            *pos += 2;
                        }
                        '"' => {
                            *pos += 1;
                            break;
                        }
                        c => {
                            value.push(*c);
                            *pos += 1;
                        }
                    }
                }
                elements.push(ArrayElement::Text {
                    value,
                    quoted: true,
                });
            }
            _ => {
                let start = *pos;
                while let Some(c) = chars.get(*pos) {
                    if *c == ',' || *c == '}' {
                        break;
                    }
                    *pos += 1;
                }
                let raw: String = chars[start..*pos].iter().collect();
                let raw = raw.trim();
                if raw.eq_ignore_ascii_case("NULL") {
                    elements.push(ArrayElement::Null);
                } else {
                    elements.push(ArrayElement::Text {
                        value: raw.to_string(),
                        quoted: false,
                    });
                }
            }
        }

        skip_spaces(chars, pos);
        match chars.get(*pos)? {
            ',' => *pos += 1,
            '}' => {
                *pos += 1;
                return Some(elements);
            }
            _ => return None,
        }
    }
}

fn skip_spaces(chars: &[char], pos: &mut usize) {
    while chars.get(*pos).is_some_and(|c| c.is_whitespace()) {
        *pos += 1;
    }
}

fn parse_json_array(text: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Some(v);
    }
    if text.contains('\'') && !text.contains('"') {
        return serde_json::from_str::<Value>(&text.replace('\'', "\"")).ok();
    }
    None
}

fn render_json_items(items: &[Value]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_element(s),
            Value::Array(nested) => render_json_items(nested),
            Value::Object(_) => quote_element(&item.to_string()),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn element_to_json(element: &ArrayElement) -> Value {
    match element {
        ArrayElement::Null => Value::Null,
        ArrayElement::Nested(items) => Value::Array(items.iter().map(element_to_json).collect()),
        ArrayElement::Text { value, quoted: true } => Value::String(value.clone()),
        ArrayElement::Text {
            value,
            quoted: false,
        } => match value.as_str() {
            "true" | "t" => Value::Bool(true),
            "false" | "f" => Value::Bool(false),
            _ => serde_json::from_str::<serde_json::Number>(value)
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(value.clone())),
        },
    }
}

/// Quote an element when the literal grammar requires it.
fn quote_element(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.eq_ignore_ascii_case("NULL")
        || value
            .chars()
            .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_whitespace());
    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Split on commas that are not inside single or double quotes.
fn split_outside_quotes(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ',') => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if !text[start..].trim().is_empty() || !parts.is_empty() {
        parts.push(&text[start..]);
    }
    parts
}
