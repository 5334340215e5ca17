//! Purpose: Resolve key types and materialize values through the command capability.
//! Exports: `resolve`, `load`, `load_record`.
//! Role: The only place typed `Value`s and `Record`s are constructed from store replies.
//! Invariants: One read primitive per key type; each key is read in full.
//! Invariants: The loader never reorders store replies (ZSET order is the store's).
use bstr::{BString, ByteSlice};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::commands::Commands;
use crate::core::error::{Error, ErrorKind};
use crate::core::record::{KeyType, Record, ScoredMember, Value};

/// Maps a key to one of the supported types, or `UnknownType`.
pub fn resolve(commands: &mut dyn Commands, key: &[u8]) -> Result<KeyType, Error> {
    let tag = commands.type_of(key)?;
    tag.parse::<KeyType>().map_err(|err| err.with_key(key))
}

/// Reads the full value of `key` with the primitive for `key_type`.
pub fn load(commands: &mut dyn Commands, key: &[u8], key_type: KeyType) -> Result<Value, Error> {
    let value = match key_type {
        KeyType::String => match commands.get(key)? {
            Some(value) => Value::String(lossy(value)),
            None => {
                return Err(Error::new(ErrorKind::UnknownType)
                    .with_message("key vanished before its value was read")
                    .with_key(key));
            }
        },
        KeyType::List => Value::List(commands.lrange(key)?.into_iter().map(lossy).collect()),
        KeyType::Set => Value::Set(
            commands
                .smembers(key)?
                .into_iter()
                .map(lossy)
                .collect::<BTreeSet<_>>(),
        ),
        KeyType::Hash => Value::Hash(
            commands
                .hgetall(key)?
                .into_iter()
                .map(|(field, value)| (lossy(field), lossy(value)))
                .collect::<BTreeMap<_, _>>(),
        ),
        KeyType::ZSet => Value::ZSet(unique_members(commands.zrange_with_scores(key)?)),
    };
    Ok(value)
}

/// Resolves and loads one key into a record.
pub fn load_record(commands: &mut dyn Commands, key: &[u8]) -> Result<Record, Error> {
    let key_type = resolve(commands, key)?;
    let value = load(commands, key, key_type)?;
    Ok(Record::new(key, value))
}

fn lossy(bytes: BString) -> String {
    match String::from_utf8(bytes.into()) {
        Ok(text) => text,
        Err(err) => err.as_bytes().to_str_lossy().into_owned(),
    }
}

// Last score wins for a repeated member; first position is kept.
fn unique_members(pairs: Vec<(BString, f64)>) -> Vec<ScoredMember> {
    let mut members: Vec<ScoredMember> = Vec::with_capacity(pairs.len());
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    for (member, score) in pairs {
        let member = lossy(member);
        match index.get(&member) {
            Some(&at) => members[at].score = score,
            None => {
                index.insert(member.clone(), members.len());
                members.push(ScoredMember { member, score });
            }
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::{load, load_record, resolve, unique_members};
    use crate::core::error::ErrorKind;
    use crate::core::memory::MemoryStore;
    use crate::core::record::{KeyType, Value};
    use bstr::BString;

    #[test]
    fn resolve_reports_supported_types() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_string("status", "online");
        conn.seed_list("todos", &["a"]);
        assert_eq!(resolve(&mut conn, b"status").unwrap(), KeyType::String);
        assert_eq!(resolve(&mut conn, b"todos").unwrap(), KeyType::List);
    }

    #[test]
    fn resolve_rejects_unmodeled_type() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_other("events", "stream");
        let err = resolve(&mut conn, b"events").expect_err("stream");
        assert_eq!(err.kind(), ErrorKind::UnknownType);
        assert_eq!(err.key().map(|k| k.to_string()), Some("events".to_string()));
    }

    #[test]
    fn list_preserves_store_order() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_list("todos", &["coffee", "code", "drink", "sleep"]);
        let value = load(&mut conn, b"todos", KeyType::List).unwrap();
        // LPUSH semantics: last pushed element is at the head.
        assert_eq!(
            value.as_list().unwrap(),
            ["sleep", "drink", "code", "coffee"]
        );
    }

    #[test]
    fn hash_loads_all_fields() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_hash("user:1", &[("name", "ada"), ("lang", "en")]);
        let record = load_record(&mut conn, b"user:1").unwrap();
        let fields = record.value().as_hash().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("name").map(String::as_str), Some("ada"));
    }

    #[test]
    fn zset_keeps_store_order_and_scores() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_zset("reviews", &[("writing", 19.0), ("reading", 14.0), ("maths", 15.0)]);
        let value = load(&mut conn, b"reviews", KeyType::ZSet).unwrap();
        let members: Vec<(&str, f64)> = value
            .as_zset()
            .unwrap()
            .iter()
            .map(|m| (m.member.as_str(), m.score))
            .collect();
        assert_eq!(
            members,
            [("reading", 14.0), ("maths", 15.0), ("writing", 19.0)]
        );
    }

    #[test]
    fn vanished_string_is_unknown_type() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        let err = load(&mut conn, b"gone", KeyType::String).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn duplicate_zset_members_collapse() {
        let members = unique_members(vec![
            (BString::from("a"), 1.0),
            (BString::from("b"), 2.0),
            (BString::from("a"), 3.0),
        ]);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].member, "a");
        assert_eq!(members[0].score, 3.0);
    }

    #[test]
    fn invalid_utf8_values_are_replaced() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_string("bin", &b"\xffok"[..]);
        let record = load_record(&mut conn, b"bin").unwrap();
        assert_eq!(record.value(), &Value::String("\u{fffd}ok".to_string()));
    }
}
