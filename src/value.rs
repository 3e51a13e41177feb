use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Represents a single value read from or written to a column.
///
/// Integers are surfaced as [Value::Int] whenever they fit an `i64`; only `uint64` values above
/// `i64::MAX` use [Value::Uint]. The column's [crate::DataType] decides the accepted range on
/// append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// represents an empty or missing value.
    Null,
    /// A 64-bit signed integer value.
    Int(i64),
    /// An unsigned integer above `i64::MAX`.
    Uint(u64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A UTF-8 string value, wrapped in an [Arc] so interned strings are shared
    /// between the pool and every column holding them.
    Text(Arc<str>),
}

impl Value {
    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the inner integer value if this is a [Value::Int].
    /// Otherwise, returns `None`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer view wide enough for every integer column type.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::Int(i) => Some(*i as i128),
            Self::Uint(u) => Some(*u as i128),
            _ => None,
        }
    }

    /// Returns the value as a float if it is numeric.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Uint(u) => Some(*u as f64),
            _ => None,
        }
    }

    /// Returns a reference to the inner string slice if this is a [Value::Text].
    /// Otherwise, returns `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Uint(_) | Self::Float(_))
    }

    /// Returns true for literals no value compares with: `NULL` and `NaN`.
    pub fn is_unordered(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Name of the value's kind, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    /// Compares two values with SQL semantics.
    ///
    /// Returns `None` if either side is `NULL`, if the kinds are not comparable
    /// (text against a number), or if a float comparison involves `NaN`.
    /// Integers and floats compare numerically with each other.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(_) | Self::Uint(_), Self::Int(_) | Self::Uint(_)) => {
                Some(self.as_i128()?.cmp(&other.as_i128()?))
            }
            (Self::Text(l), Self::Text(r)) => Some(l.as_ref().cmp(r.as_ref())),
            (Self::Int(_) | Self::Uint(_) | Self::Float(_), _) if other.is_numeric() => {
                self.as_float()?.partial_cmp(&other.as_float()?)
            }
            _ => None,
        }
    }

    /// Total order used for sorting rows: `NULL` first, then numbers, then text.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Int(_) | Value::Uint(_) | Value::Float(_) => 1,
                Value::Text(_) => 2,
            }
        }
        self.sql_cmp(other)
            .unwrap_or_else(|| rank(self).cmp(&rank(other)))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::Uint(v), Self::Int)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─────────────────────────────────────────────────────────────
    // Test 1 : accessors
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Float(1.5).as_int(), None);
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert_eq!(Value::Text("x".into()).as_float(), None);
        assert_eq!(Value::Text("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Null.as_str(), None);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : SQL comparison
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_sql_cmp() {
        assert_eq!(Value::Int(1).sql_cmp(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Value::Int(2).sql_cmp(&Value::Float(1.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Text("a".into()).sql_cmp(&Value::Text("a".into())),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Null.sql_cmp(&Value::Null), None);
        assert_eq!(Value::Int(1).sql_cmp(&Value::Text("1".into())), None);
        assert_eq!(Value::Float(f64::NAN).sql_cmp(&Value::Float(1.0)), None);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 3 : sort order
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_sort_cmp() {
        let mut values = vec![
            Value::Text("b".into()),
            Value::Int(3),
            Value::Null,
            Value::Float(0.5),
            Value::Text("a".into()),
        ];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Float(0.5),
                Value::Int(3),
                Value::Text("a".into()),
                Value::Text("b".into()),
            ]
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Test 4 : conversions
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_from() {
        assert_eq!(Value::from(7u32), Value::Int(7));
        assert_eq!(Value::from(-7i32), Value::Int(-7));
        assert_eq!(Value::from("s"), Value::Text("s".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(2.5)), Value::Float(2.5));
        assert_eq!(Value::from(5u64), Value::Int(5));
        assert_eq!(Value::from(u64::MAX), Value::Uint(u64::MAX));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 5 : integers above i64::MAX
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_uint_above_i64() {
        let big = Value::from(u64::MAX);
        assert_eq!(big.as_int(), None);
        assert_eq!(big.as_i128(), Some(u64::MAX as i128));
        assert_eq!(big.sql_cmp(&Value::Int(i64::MAX)), Some(Ordering::Greater));
        assert_eq!(Value::Int(-1).sql_cmp(&big), Some(Ordering::Less));
        assert_eq!(big.sql_cmp(&Value::Float(1.0)), Some(Ordering::Greater));
        assert!(big.is_numeric());

        let json = serde_json::to_string(&big).unwrap();
        assert_eq!(json, "18446744073709551615");
        assert_eq!(serde_json::from_str::<Value>(&json).unwrap(), big);
        assert_eq!(serde_json::from_str::<Value>("7").unwrap(), Value::Int(7));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 6 : literals that order against nothing
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_is_unordered() {
        assert!(Value::Null.is_unordered());
        assert!(Value::Float(f64::NAN).is_unordered());
        assert!(!Value::Float(1.0).is_unordered());
        assert!(!Value::Int(0).is_unordered());
    }
}
