//! Raw configuration values and the coercion rules applied by typed getters.

use std::collections::BTreeMap;
use std::fmt;

/// A value as returned by a configuration source, before coercion.
///
/// The environment and key-value sources speak text protocols and only ever
/// produce [`RawValue::String`]. The file source hands back whatever scalar type
/// the YAML document declared, or a nested mapping for intermediate keys.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// A textual value.
    String(String),
    /// An integral number.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// A nested mapping (an intermediate node of a hierarchical source).
    Map(BTreeMap<String, RawValue>),
    /// A list. Present for lookups, but never coerces to a primitive.
    Sequence(Vec<RawValue>),
}

impl RawValue {
    /// Convert a parsed YAML node. `null` (and nulls inside mappings or lists)
    /// are treated as absent.
    pub fn from_yaml(value: serde_yaml::Value) -> Option<Self> {
        use serde_yaml::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::String(s)),
            Value::Sequence(items) => Some(Self::Sequence(
                items.into_iter().filter_map(Self::from_yaml).collect(),
            )),
            Value::Mapping(mapping) => {
                let mut map = BTreeMap::new();
                for (key, value) in mapping {
                    let Some(key) = yaml_key(key) else { continue };
                    if let Some(value) = Self::from_yaml(value) {
                        map.insert(key, value);
                    }
                }
                Some(Self::Map(map))
            }
            Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }

    /// Coerce to a string. Only native strings succeed.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Coerce to a boolean.
    ///
    /// Native booleans pass through, strings are parsed as boolean literals.
    /// Numbers never coerce, however truthy they look.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Coerce to an integer.
    ///
    /// Numbers truncate toward zero. Strings are parsed as integers first and
    /// as floats (then truncated) second.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => truncate(*f),
            Self::String(s) => parse_int(s).or_else(|| parse_float(s).and_then(truncate)),
            _ => None,
        }
    }

    /// Coerce to a float. Numbers convert, strings are parsed.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => parse_float(s),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Map(map) => write!(f, "<map of {} keys>", map.len()),
            Self::Sequence(items) => write!(f, "<sequence of {} items>", items.len()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;

    match key {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => yaml_key(tagged.value),
        _ => None,
    }
}

/// Truncate toward zero. Values outside the `i64` range have no integer form.
fn truncate(f: f64) -> Option<i64> {
    const BOUND: f64 = 9_223_372_036_854_775_808.0; // 2^63
    (f.is_finite() && (-BOUND..BOUND).contains(&f)).then(|| f.trunc() as i64)
}

/// Boolean literals: `1 t T TRUE true True` and `0 f F FALSE false False`.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Integer literal with an optional sign and a base prefix: `0x`, `0o`, `0b`,
/// or a bare leading `0` for octal.
fn parse_int(s: &str) -> Option<i64> {
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, body) = if let Some(rest) = strip_prefix_ci(digits, "0x") {
        (16, rest)
    } else if let Some(rest) = strip_prefix_ci(digits, "0o") {
        (8, rest)
    } else if let Some(rest) = strip_prefix_ci(digits, "0b") {
        (2, rest)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    // from_str_radix tolerates its own sign, which would allow "--5" or "0x-5"
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }

    let magnitude = i128::from(u64::from_str_radix(body, radix).ok()?);
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}
