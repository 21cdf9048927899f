//! Cell values shared by the merge and rule pipelines.
//!
//! A cell is `Option<Value>`: `None` is the single null representation. NaN
//! numbers are folded into `None` by [`normalize_cell()`] so every consumer sees
//! one kind of "missing".
//!
//! Integers and floats are kept apart so that integral identifiers survive a
//! read/write cycle byte for byte.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
}

pub type Cell = Option<Value>;

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    /// Lenient numeric view: numbers pass through, text is parsed after
    /// trimming, booleans count as 1/0.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

/// Integral finite numbers render without a fractional part so that `10` read
/// from one file and `10.0` computed by the engine stringify identically.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

pub fn normalize_cell(cell: Cell) -> Cell {
    match cell {
        Some(Value::Number(n)) if n.is_nan() => None,
        other => other,
    }
}

/// String form used by key matching, concatenation and string predicates.
/// Null renders as the empty string, never as a placeholder word.
pub fn cell_to_string(cell: &Cell) -> String {
    cell.as_ref().map(Value::as_display).unwrap_or_default()
}

pub fn cell_to_f64(cell: &Cell) -> Option<f64> {
    cell.as_ref().and_then(Value::as_f64)
}

/// Change-detection equality: both null, or both present and natively equal.
/// Integers and floats compare numerically; any other type mismatch (`10` vs
/// `"10"`) counts as a change.
pub fn values_equal(left: &Cell, right: &Cell) -> bool {
    match (normalize_ref(left), normalize_ref(right)) {
        (None, None) => true,
        (Some(Value::Integer(i)), Some(Value::Number(n)))
        | (Some(Value::Number(n)), Some(Value::Integer(i))) => *i as f64 == *n,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn normalize_ref(cell: &Cell) -> Option<&Value> {
    match cell {
        Some(Value::Number(n)) if n.is_nan() => None,
        other => other.as_ref(),
    }
}

/// Infers a typed cell from raw delimited text: empty is null, `true`/`false`
/// (any case) are booleans, plain decimal integers that fit `i64` are integers
/// and plain decimal fractions are floats.
///
/// Text that would not print back the same stays a string: leading zeros
/// (`007`), exponent notation (`1E5`), integers beyond `i64`.
pub fn parse_cell(raw: &str) -> Cell {
    if raw.is_empty() {
        return None;
    }
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Some(Value::Boolean(true));
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Some(Value::Boolean(false));
    }
    match numeric_shape(trimmed) {
        Some(NumericShape::Integer) => {
            if let Ok(parsed) = trimmed.parse::<i64>() {
                return Some(Value::Integer(parsed));
            }
        }
        Some(NumericShape::Fraction) => {
            if let Ok(parsed) = trimmed.parse::<f64>()
                && parsed.is_finite()
            {
                return Some(Value::Number(parsed));
            }
        }
        None => {}
    }
    Some(Value::String(raw.to_string()))
}

enum NumericShape {
    Integer,
    Fraction,
}

// Optional `-`, digits, optional `.digits`. A multi-digit integer part may
// not start with `0`.
fn numeric_shape(value: &str) -> Option<NumericShape> {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || (whole.len() > 1 && whole.starts_with('0')) {
        return None;
    }
    match fraction {
        None if !whole.is_empty() => Some(NumericShape::Integer),
        Some(fraction)
            if all_digits(fraction) && !(whole.is_empty() && fraction.is_empty()) =>
        {
            Some(NumericShape::Fraction)
        }
        _ => None,
    }
}
