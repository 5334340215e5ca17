//! Purpose: Mutation executors applied before a reload.
//! Exports: `Executor`, `MutationInput`, `ExecutionOutcome`.
//! Role: Turns an intended change into store commands and reports the result as data.
//! Invariants: `apply` never returns `Err` and never panics; faults become failed outcomes.
//! Invariants: LIST/SET raw values split on `,` literally (no trimming).
use bstr::{BString, ByteSlice};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::core::commands::Commands;
use crate::core::error::{Error, ErrorKind, error_trace};
use crate::core::record::KeyType;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub failed: bool,
    #[serde(rename = "errorTrace")]
    pub error_trace: String,
    #[serde(skip)]
    kind: Option<ErrorKind>,
}

impl ExecutionOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(err: &Error) -> Self {
        Self {
            failed: true,
            error_trace: error_trace(err),
            kind: Some(err.kind()),
        }
    }

    /// Kind of the error behind a failed outcome.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    fn from_result(result: Result<(), Error>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(err) => {
                tracing::warn!(kind = ?err.kind(), "mutation failed: {err}");
                Self::failed(&err)
            }
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MutationInput {
    pub key: BString,
    pub key_type: KeyType,
    pub raw_value: String,
}

impl MutationInput {
    pub fn new(key: impl Into<BString>, key_type: KeyType, raw_value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            key_type,
            raw_value: raw_value.into(),
        }
    }

    fn elements(&self) -> Vec<&[u8]> {
        self.raw_value.split(',').map(str::as_bytes).collect()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Executor {
    #[default]
    NoOp,
    AddKeyValue(MutationInput),
    RemoveKeys(BTreeSet<BString>),
}

impl Executor {
    pub fn add(input: MutationInput) -> Self {
        Executor::AddKeyValue(input)
    }

    pub fn remove<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<BString>,
    {
        Executor::RemoveKeys(keys.into_iter().map(Into::into).collect())
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Executor::NoOp)
    }

    pub fn apply(&self, commands: &mut dyn Commands) -> ExecutionOutcome {
        match self {
            Executor::NoOp => ExecutionOutcome::ok(),
            Executor::AddKeyValue(input) => ExecutionOutcome::from_result(add_key_value(commands, input)),
            Executor::RemoveKeys(keys) => ExecutionOutcome::from_result(remove_keys(commands, keys)),
        }
    }
}

fn add_key_value(commands: &mut dyn Commands, input: &MutationInput) -> Result<(), Error> {
    let key = input.key.as_bytes();
    match input.key_type {
        KeyType::String => commands.set(key, input.raw_value.as_bytes())?,
        KeyType::List => {
            let len = commands.lpush(key, &input.elements())?;
            tracing::debug!(key = %input.key, len, "pushed list elements");
        }
        KeyType::Set => {
            let added = commands.sadd(key, &input.elements())?;
            tracing::debug!(key = %input.key, added, "added set members");
        }
        KeyType::Hash | KeyType::ZSet => {
            return Err(Error::new(ErrorKind::UnsupportedMutation)
                .with_message(format!("adding {} values is not supported", input.key_type))
                .with_hint("Only STRING, LIST, and SET keys can be added.")
                .with_key(key));
        }
    }
    tracing::info!(key = %input.key, key_type = %input.key_type, "added key value");
    Ok(())
}

fn remove_keys(commands: &mut dyn Commands, keys: &BTreeSet<BString>) -> Result<(), Error> {
    if keys.is_empty() {
        return Ok(());
    }
    let keys: Vec<&[u8]> = keys.iter().map(|key| key.as_bytes()).collect();
    let removed = commands.del(&keys)?;
    tracing::info!(requested = keys.len(), removed, "removed keys");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ExecutionOutcome, Executor, MutationInput};
    use crate::core::commands::Commands;
    use crate::core::error::ErrorKind;
    use crate::core::memory::MemoryStore;
    use crate::core::record::KeyType;

    #[test]
    fn noop_touches_nothing() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        store.set_offline(true);
        assert_eq!(Executor::NoOp.apply(&mut conn), ExecutionOutcome::ok());
    }

    #[test]
    fn add_string_overwrites() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_list("hello", &["old"]);
        let outcome = Executor::add(MutationInput::new("hello", KeyType::String, "world"))
            .apply(&mut conn);
        assert!(!outcome.failed);
        assert_eq!(outcome.error_trace, "");
        assert_eq!(conn.get(b"hello").unwrap().unwrap(), "world");
    }

    #[test]
    fn add_list_splits_on_commas() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        let outcome =
            Executor::add(MutationInput::new("hello", KeyType::List, "a, b,")).apply(&mut conn);
        assert!(!outcome.failed);
        assert_eq!(conn.lrange(b"hello").unwrap(), ["", " b", "a"]);
    }

    #[test]
    fn add_hash_is_reported_not_raised() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        let outcome = Executor::add(MutationInput::new("hello", KeyType::Hash, "x")).apply(&mut conn);
        assert!(outcome.failed);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::UnsupportedMutation));
        assert!(outcome.error_trace.starts_with("UnsupportedMutation"));
        assert_eq!(conn.type_of(b"hello").unwrap(), "none");
    }

    #[test]
    fn add_zset_is_reported_not_raised() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        let outcome = Executor::add(MutationInput::new("z", KeyType::ZSet, "1")).apply(&mut conn);
        assert!(outcome.failed);
    }

    #[test]
    fn store_fault_is_captured_in_trace() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        store.set_offline(true);
        let outcome =
            Executor::add(MutationInput::new("k", KeyType::Set, "a")).apply(&mut conn);
        assert!(outcome.failed);
        assert!(outcome.error_trace.contains("offline"));
    }

    #[test]
    fn wrongtype_push_fails_with_store_message() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_string("status", "online");
        let outcome =
            Executor::add(MutationInput::new("status", KeyType::Set, "a")).apply(&mut conn);
        assert!(outcome.failed);
        assert!(outcome.error_trace.contains("WRONGTYPE"));
    }

    #[test]
    fn remove_ignores_absent_keys() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_string("status", "online");
        let outcome = Executor::remove(["status", "missing"]).apply(&mut conn);
        assert!(!outcome.failed);
        assert!(conn.keys(b"*").unwrap().is_empty());
    }

    #[test]
    fn remove_nothing_issues_no_command() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        store.set_offline(true);
        let keys: [&str; 0] = [];
        assert!(!Executor::remove(keys).apply(&mut conn).failed);
    }

    #[test]
    fn outcome_serializes_error_trace_name() {
        let value = serde_json::to_value(ExecutionOutcome::ok()).expect("json");
        assert_eq!(value, serde_json::json!({"failed": false, "errorTrace": ""}));
    }
}
