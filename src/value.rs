use chrono::NaiveDateTime;

use ebml_tree_specification::ElementKey;

///
/// An in-memory EBML value tree.
///
/// This is what [`Element::dump`](crate::Element::dump) produces and what the encoder consumes.  A master element is
/// an ordered list of `(key, value)` entries; an element allowed to appear more than once is grouped under a single
/// entry holding a [`Value::Multiple`].
///
/// ## Example
///
/// ```
/// use ebml_tree::Value;
///
/// let tree = Value::master([
///     ("EBMLVersion", Value::from(1u64)),
///     ("DocType", Value::String(String::from("webm"))),
/// ]);
/// assert_eq!(Some(1), tree.get("EBMLVersion").and_then(Value::as_u64));
/// assert_eq!(Some("webm"), tree.get("DocType").and_then(Value::as_str));
/// ```
///
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    UnsignedInt(u64),
    Integer(i64),
    Float(f64),
    String(String),
    Utf8(String),
    Date(NaiveDateTime),
    Binary(Vec<u8>),
    Master(Vec<(ElementKey, Value)>),
    Multiple(Vec<Value>),
}

impl Value {
    ///
    /// Builds a [`Value::Master`] from anything that can be turned into element keys and values.
    ///
    pub fn master<K, V, I>(entries: I) -> Value
        where K: Into<ElementKey>, V: Into<Value>, I: IntoIterator<Item = (K, V)>
    {
        Value::Master(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::UnsignedInt(_) => "an unsigned integer",
            Value::Integer(_) => "an integer",
            Value::Float(_) => "a float",
            Value::String(_) => "a string",
            Value::Utf8(_) => "a utf-8 string",
            Value::Date(_) => "a date",
            Value::Binary(_) => "binary data",
            Value::Master(_) => "a master value",
            Value::Multiple(_) => "multiple values",
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UnsignedInt(v) => Some(*v),
            Value::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::UnsignedInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) | Value::Utf8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[(ElementKey, Value)]> {
        match self {
            Value::Master(entries) => Some(entries),
            _ => None,
        }
    }

    ///
    /// Looks up the entry for `key` in a master value.  Returns `None` for any other variant.
    ///
    pub fn get(&self, key: impl Into<ElementKey>) -> Option<&Value> {
        let key = key.into();
        self.entries()?.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UnsignedInt(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Utf8(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Date(v)
    }
}
