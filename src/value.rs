use crate::quicklist::Quicklist;
use crate::zipmap::Zipmap;

/// Longest decimal string considered for integer promotion. i64::MIN
/// prints as 20 characters.
const INT_PROMOTION_MAX_LEN: usize = 20;

/// A stored value together with the encoding it currently uses.
#[derive(Debug, Clone)]
pub enum Value {
    /// A string whose bytes parse as a signed 64-bit integer.
    Int(i64),
    /// An arbitrary byte string.
    Raw(Vec<u8>),
    /// A list spread over compact-buffer nodes.
    List(Quicklist),
    /// A small hash over one compact buffer.
    Hash(Zipmap),
}

impl Value {
    /// Wrap raw string bytes, promoting short base-10 numerals to the
    /// integer encoding.
    pub fn from_raw(data: Vec<u8>) -> Value {
        if data.len() <= INT_PROMOTION_MAX_LEN {
            if let Some(n) = std::str::from_utf8(&data)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
            {
                return Value::Int(n);
            }
        }
        Value::Raw(data)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) | Value::Raw(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
        }
    }

    pub fn encoding_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Raw(_) => "raw",
            Value::List(_) => "quicklist",
            Value::Hash(_) => "zipmap",
        }
    }

    /// String bytes, rendering the integer form back to base 10. None
    /// for lists and hashes.
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::Int(n) => Some(n.to_string().into_bytes()),
            Value::Raw(data) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Quicklist> {
        match self {
            Value::List(ql) => Some(ql),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Quicklist> {
        match self {
            Value::List(ql) => Some(ql),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&Zipmap> {
        match self {
            Value::Hash(zm) => Some(zm),
            _ => None,
        }
    }

    pub fn as_hash_mut(&mut self) -> Option<&mut Zipmap> {
        match self {
            Value::Hash(zm) => Some(zm),
            _ => None,
        }
    }
}
