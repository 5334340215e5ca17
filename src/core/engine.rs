//! Purpose: Query engine: optional mutation, then a full scan and reload.
//! Exports: `Connector`, `Engine`, `Query`, `scan`.
//! Role: Orchestrates connector, executors, resolver, and loader for one call.
//! Invariants: A reload always follows a mutation attempt, whatever its outcome.
//! Invariants: Each matched key of a supported type yields exactly one record.
//! Invariants: Read-path errors fail the call; unknown types are skipped.
//! Invariants: The connection lives for one call and is dropped on every exit path.
use bstr::{BString, ByteSlice};
use std::collections::BTreeSet;

use crate::core::commands::Commands;
use crate::core::config::{Database, ServerConfiguration};
use crate::core::error::{Error, ErrorKind};
use crate::core::executor::{ExecutionOutcome, Executor};
use crate::core::load::load_record;
use crate::core::record::LoadResult;

pub const MATCH_ALL: &str = "*";

/// Opens a command capability for one engine call.
pub trait Connector {
    type Connection: Commands;

    fn connect(
        &self,
        server: &ServerConfiguration,
        database: &Database,
    ) -> Result<Self::Connection, Error>;

    fn list_databases(&self, server: &ServerConfiguration) -> Result<Vec<Database>, Error>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Query {
    pattern: String,
}

impl Query {
    /// Blank patterns match every key.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if pattern.trim().is_empty() {
            return Self::all();
        }
        Self { pattern }
    }

    pub fn all() -> Self {
        Self {
            pattern: MATCH_ALL.to_string(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::all()
    }
}

/// Enumerates keys matching `query` and loads each one.
pub fn scan(commands: &mut dyn Commands, query: &Query) -> Result<LoadResult, Error> {
    let keys = commands.keys(query.pattern().as_bytes())?;
    let mut seen: BTreeSet<BString> = BTreeSet::new();
    let mut records = Vec::with_capacity(keys.len());
    let mut skipped = 0;

    for key in keys {
        if !seen.insert(key.clone()) {
            continue;
        }
        match load_record(commands, key.as_bytes()) {
            Ok(record) => records.push(record),
            Err(err) if err.kind() == ErrorKind::UnknownType => {
                tracing::debug!(key = %key, "skipping key: {err}");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    tracing::debug!(
        pattern = query.pattern(),
        loaded = records.len(),
        skipped,
        "scan finished"
    );
    Ok(LoadResult::new(records, skipped))
}

#[derive(Clone, Debug, Default)]
pub struct Engine<C> {
    connector: C,
}

impl<C: Connector> Engine<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Read-only scan.
    pub fn load_records(
        &self,
        server: &ServerConfiguration,
        database: &Database,
        query: &Query,
    ) -> Result<LoadResult, Error> {
        let mut connection = self.connector.connect(server, database)?;
        scan(&mut connection, query)
    }

    /// Applies `executor`, then reloads regardless of the outcome.
    pub fn load_records_with(
        &self,
        server: &ServerConfiguration,
        database: &Database,
        query: &Query,
        executor: &Executor,
    ) -> Result<(LoadResult, ExecutionOutcome), Error> {
        let mut connection = self.connector.connect(server, database)?;
        let outcome = if executor.is_noop() {
            ExecutionOutcome::ok()
        } else {
            executor.apply(&mut connection)
        };
        let result = scan(&mut connection, query)?;
        Ok((result, outcome))
    }

    pub fn list_databases(&self, server: &ServerConfiguration) -> Result<Vec<Database>, Error> {
        self.connector.list_databases(server)
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, Query, scan};
    use crate::core::config::{Database, ServerConfiguration};
    use crate::core::error::ErrorKind;
    use crate::core::executor::{Executor, MutationInput};
    use crate::core::memory::{MemoryConnector, MemoryStore};
    use crate::core::record::KeyType;

    fn engine_with(store: &MemoryStore) -> Engine<MemoryConnector> {
        Engine::new(MemoryConnector::new(store.clone()))
    }

    #[test]
    fn blank_pattern_matches_all() {
        assert_eq!(Query::new("  ").pattern(), "*");
        assert_eq!(Query::new("user:*").pattern(), "user:*");
    }

    #[test]
    fn scan_skips_unmodeled_types() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        conn.seed_string("status", "online");
        conn.seed_other("events", "stream");
        let result = scan(&mut conn, &Query::all()).expect("scan");
        assert_eq!(result.len(), 1);
        assert_eq!(result.skipped(), 1);
        assert_eq!(result.records()[0].key_type(), KeyType::String);
    }

    #[test]
    fn scan_fails_when_store_is_offline() {
        let store = MemoryStore::new();
        let mut conn = store.connection(0).expect("db");
        store.set_offline(true);
        let err = scan(&mut conn, &Query::all()).expect_err("offline");
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn reload_follows_failed_mutation() {
        let store = MemoryStore::new();
        store.connection(1).expect("db").seed_string("status", "online");
        let engine = engine_with(&store);
        let executor = Executor::add(MutationInput::new("hello", KeyType::Hash, "x"));
        let (result, outcome) = engine
            .load_records_with(
                &ServerConfiguration::default(),
                &Database::new("1"),
                &Query::all(),
                &executor,
            )
            .expect("load");
        assert!(outcome.failed);
        assert_eq!(result.len(), 1);
        assert!(result.get(b"hello").is_none());
    }

    #[test]
    fn invalid_database_fails_before_mutation() {
        let store = MemoryStore::new();
        let engine = engine_with(&store);
        let err = engine
            .load_records(
                &ServerConfiguration::default(),
                &Database::new("sixteen"),
                &Query::all(),
            )
            .expect_err("database");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn list_databases_reports_each_index() {
        let engine = engine_with(&MemoryStore::with_databases(3));
        let databases = engine
            .list_databases(&ServerConfiguration::default())
            .expect("databases");
        let ids: Vec<String> = databases.into_iter().map(|db| db.identifier).collect();
        assert_eq!(ids, ["0", "1", "2"]);
    }
}
