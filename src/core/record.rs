//! Purpose: Typed in-memory shape of loaded keys.
//! Exports: `KeyType`, `Value`, `ScoredMember`, `Record`, `LoadResult`.
//! Role: Data model shared by the loader, engine, selection, tree, and CLI output.
//! Invariants: A record's key type is derived from its value variant, never stored apart.
//! Invariants: Records are only constructed inside the crate (by the value loader).
use bstr::{BString, ByteSlice};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    String,
    List,
    Set,
    Hash,
    ZSet,
}

impl KeyType {
    pub const ALL: [KeyType; 5] = [
        KeyType::String,
        KeyType::List,
        KeyType::Set,
        KeyType::Hash,
        KeyType::ZSet,
    ];

    /// Store-side tag, as reported by `TYPE`.
    pub fn tag(self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::Hash => "hash",
            KeyType::ZSet => "zset",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag().to_ascii_uppercase())
    }
}

impl FromStr for KeyType {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        KeyType::ALL
            .into_iter()
            .find(|kind| kind.tag().eq_ignore_ascii_case(tag.trim()))
            .ok_or_else(|| {
                Error::new(ErrorKind::UnknownType)
                    .with_message(format!("unsupported key type `{tag}`"))
            })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    List(Vec<String>),
    Set(BTreeSet<String>),
    Hash(BTreeMap<String, String>),
    ZSet(Vec<ScoredMember>),
}

impl Value {
    pub fn key_type(&self) -> KeyType {
        match self {
            Value::String(_) => KeyType::String,
            Value::List(_) => KeyType::List,
            Value::Set(_) => KeyType::Set,
            Value::Hash(_) => KeyType::Hash,
            Value::ZSet(_) => KeyType::ZSet,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Value::Set(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Value::Hash(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_zset(&self) -> Option<&[ScoredMember]> {
        match self {
            Value::ZSet(members) => Some(members),
            _ => None,
        }
    }

    /// Number of elements (1 for strings).
    pub fn len(&self) -> usize {
        match self {
            Value::String(_) => 1,
            Value::List(values) => values.len(),
            Value::Set(values) => values.len(),
            Value::Hash(fields) => fields.len(),
            Value::ZSet(members) => members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    key: BString,
    value: Value,
}

impl Record {
    pub(crate) fn new(key: impl Into<BString>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Exact key identity as stored.
    pub fn key(&self) -> &BString {
        &self.key
    }

    /// Key for display; invalid UTF-8 is replaced.
    pub fn key_lossy(&self) -> String {
        self.key.to_str_lossy().into_owned()
    }

    pub fn key_type(&self) -> KeyType {
        self.value.key_type()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Record", 3)?;
        state.serialize_field("key", &self.key_lossy())?;
        state.serialize_field("type", &self.key_type())?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LoadResult {
    records: Vec<Record>,
    /// Matched keys left out because their type is not modeled.
    skipped: usize,
}

impl LoadResult {
    pub(crate) fn new(records: Vec<Record>, skipped: usize) -> Self {
        Self { records, skipped }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Record> {
        self.records
            .iter()
            .find(|record| record.key().as_bytes() == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &BString> {
        self.records.iter().map(Record::key)
    }

    /// Orders records by key bytes; the engine itself promises no order.
    pub fn sorted(mut self) -> Self {
        self.records.sort_by(|a, b| a.key.cmp(&b.key));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyType, LoadResult, Record, ScoredMember, Value};
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn key_type_parses_store_tags() {
        assert_eq!("string".parse::<KeyType>().unwrap(), KeyType::String);
        assert_eq!("ZSET".parse::<KeyType>().unwrap(), KeyType::ZSet);
        assert_eq!("hash\r\n".parse::<KeyType>().unwrap(), KeyType::Hash);
    }

    #[test]
    fn stream_tag_is_unknown_type() {
        let err = "stream".parse::<KeyType>().expect_err("stream");
        assert_eq!(err.kind(), ErrorKind::UnknownType);
        let err = "none".parse::<KeyType>().expect_err("none");
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn record_type_follows_value_variant() {
        let record = Record::new("todos", Value::List(vec!["a".into()]));
        assert_eq!(record.key_type(), KeyType::List);
        assert_eq!(record.value().as_list(), Some(&["a".to_string()][..]));
        assert!(record.value().as_str().is_none());
    }

    #[test]
    fn record_serializes_with_upper_case_type() {
        let record = Record::new(
            "reviews",
            Value::ZSet(vec![ScoredMember {
                member: "maths".into(),
                score: 15.0,
            }]),
        );
        let value = serde_json::to_value(&record).expect("json");
        assert_eq!(
            value,
            json!({"key": "reviews", "type": "ZSET", "value": [{"member": "maths", "score": 15.0}]})
        );
    }

    #[test]
    fn non_utf8_keys_display_lossy() {
        let record = Record::new(&b"k\xff"[..], Value::String("v".into()));
        assert_eq!(record.key().as_slice(), b"k\xff");
        assert_eq!(record.key_lossy(), "k\u{fffd}");
    }

    #[test]
    fn sorted_orders_by_key() {
        let result = LoadResult::new(
            vec![
                Record::new("todos", Value::String("x".into())),
                Record::new("books", Value::String("y".into())),
            ],
            0,
        )
        .sorted();
        let keys: Vec<String> = result.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["books", "todos"]);
        assert!(result.get(b"books").is_some());
        assert!(result.get(b"status").is_none());
    }
}
