use serde_json::{Number, Value};

/// A path lookup, resolved once and then coerced per field type.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Number(Number),
    Text(String),
    Missing,
}

/// Evaluate `path` against `doc`.
///
/// Paths are dot separated (`pricing.current`, `items.0.name`); numeric
/// segments index into arrays. A path starting with `/` is taken as an
/// RFC 6901 JSON pointer. Nested objects/arrays resolve to their JSON text,
/// booleans to `"true"`/`"false"`, null to `Missing`.
pub fn resolve(doc: &Value, path: &str) -> Resolved {
    let path = path.trim();
    if path.is_empty() {
        return Resolved::Missing;
    }
    let pointer = if path.starts_with('/') {
        path.to_string()
    } else {
        to_pointer(path)
    };

    match doc.pointer(&pointer) {
        None | Some(Value::Null) => Resolved::Missing,
        Some(Value::Number(n)) => Resolved::Number(n.clone()),
        Some(Value::String(s)) => Resolved::Text(s.clone()),
        Some(Value::Bool(b)) => Resolved::Text(b.to_string()),
        Some(other) => Resolved::Text(other.to_string()),
    }
}

fn to_pointer(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('.') {
        out.push('/');
        out.push_str(&segment.replace('~', "~0").replace('/', "~1"));
    }
    out
}

impl Resolved {
    /// Text form; empty when missing.
    pub fn into_text(self) -> String {
        match self {
            Resolved::Number(n) => n.to_string(),
            Resolved::Text(s) => s,
            Resolved::Missing => String::new(),
        }
    }

    /// Non-negative finite decimal; 0.0 when missing or unparseable.
    pub fn to_decimal(&self) -> f64 {
        let value = match self {
            Resolved::Number(n) => n.as_f64(),
            Resolved::Text(s) => s.trim().parse::<f64>().ok(),
            Resolved::Missing => None,
        };
        value.map_or(0.0, clamp_decimal)
    }

    /// Integer percentage in 0..=100; 0 when missing, unparseable or out of range.
    /// Fractional numbers are truncated; fractional text is rejected.
    pub fn to_percentage(&self) -> u8 {
        let value = match self {
            Resolved::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Resolved::Text(s) => s.trim().parse::<i64>().ok(),
            Resolved::Missing => None,
        };
        value.map_or(0, clamp_percentage)
    }
}

/// Prices: negative, NaN and infinite values mean "unknown" (0.0).
pub fn clamp_decimal(v: f64) -> f64 {
    if v.is_finite() && v >= 0.0 {
        v
    } else {
        0.0
    }
}

/// Percentages outside 0..=100 mean "none" (0).
pub fn clamp_percentage(v: i64) -> u8 {
    u8::try_from(v).ok().filter(|p| *p <= 100).unwrap_or(0)
}
