//! Purpose: In-process typed keyspace implementing the command capability.
//! Exports: `MemoryStore`, `MemoryConnection`, `MemoryConnector`.
//! Role: Backing store for tests and `--memory` mode; mirrors Redis reply semantics.
//! Invariants: Each primitive runs under one lock acquisition (per-command atomicity).
//! Invariants: Key patterns use Redis syntax (`*`, `?`, `[...]`, `[^...]`, `\x`) over lossy UTF-8 keys.
//! Invariants: An unclosed `[` matches itself literally.
//! Invariants: Writing a key that holds another type fails with WRONGTYPE.
use bstr::{BString, ByteSlice};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::commands::Commands;
use crate::core::config::{Database, ServerConfiguration};
use crate::core::engine::Connector;
use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_DATABASES: usize = 16;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Clone, Debug, PartialEq)]
enum Entry {
    String(BString),
    List(VecDeque<BString>),
    Set(BTreeSet<BString>),
    Hash(BTreeMap<BString, BString>),
    ZSet(BTreeMap<BString, f64>),
    Other(String),
}

impl Entry {
    fn tag(&self) -> &str {
        match self {
            Entry::String(_) => "string",
            Entry::List(_) => "list",
            Entry::Set(_) => "set",
            Entry::Hash(_) => "hash",
            Entry::ZSet(_) => "zset",
            Entry::Other(tag) => tag,
        }
    }
}

type Keyspace = BTreeMap<BString, Entry>;

#[derive(Debug)]
struct Inner {
    databases: Vec<Keyspace>,
    offline: bool,
}

/// Shared handle; clones see the same data.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_databases(DEFAULT_DATABASES)
    }

    pub fn with_databases(count: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                databases: vec![Keyspace::new(); count.max(1)],
                offline: false,
            })),
        }
    }

    pub fn database_count(&self) -> usize {
        self.lock().databases.len()
    }

    /// Makes every command fail with a `Connection` error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn connection(&self, db: usize) -> Result<MemoryConnection, Error> {
        let count = self.database_count();
        if db >= count {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("database {db} is out of range (0..{count})")));
        }
        Ok(MemoryConnection {
            store: self.clone(),
            db,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection bound to one database of a `MemoryStore`.
#[derive(Clone, Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
    db: usize,
}

impl MemoryConnection {
    pub fn database(&self) -> usize {
        self.db
    }

    pub fn seed_string(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.insert(key, Entry::String(BString::from(value.as_ref())));
    }

    /// Pushes each value to the head in turn, like `LPUSH key v1 v2 ...`.
    pub fn seed_list<V: AsRef<[u8]>>(&mut self, key: impl AsRef<[u8]>, values: &[V]) {
        let mut list = VecDeque::new();
        for value in values {
            list.push_front(BString::from(value.as_ref()));
        }
        self.insert(key, Entry::List(list));
    }

    pub fn seed_set<V: AsRef<[u8]>>(&mut self, key: impl AsRef<[u8]>, members: &[V]) {
        let set = members
            .iter()
            .map(|member| BString::from(member.as_ref()))
            .collect();
        self.insert(key, Entry::Set(set));
    }

    pub fn seed_hash<F: AsRef<[u8]>, V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        fields: &[(F, V)],
    ) {
        let hash = fields
            .iter()
            .map(|(field, value)| (BString::from(field.as_ref()), BString::from(value.as_ref())))
            .collect();
        self.insert(key, Entry::Hash(hash));
    }

    pub fn seed_zset<M: AsRef<[u8]>>(&mut self, key: impl AsRef<[u8]>, members: &[(M, f64)]) {
        let zset = members
            .iter()
            .map(|(member, score)| (BString::from(member.as_ref()), *score))
            .collect();
        self.insert(key, Entry::ZSet(zset));
    }

    /// Stores a key of a type the engine does not model (e.g. `stream`).
    pub fn seed_other(&mut self, key: impl AsRef<[u8]>, tag: &str) {
        self.insert(key, Entry::Other(tag.to_string()));
    }

    fn insert(&mut self, key: impl AsRef<[u8]>, entry: Entry) {
        let mut inner = self.store.lock();
        inner.databases[self.db].insert(BString::from(key.as_ref()), entry);
    }

    fn with_keyspace<T>(&self, f: impl FnOnce(&mut Keyspace) -> Result<T, Error>) -> Result<T, Error> {
        let mut inner = self.store.lock();
        if inner.offline {
            return Err(Error::new(ErrorKind::Connection).with_message("memory store is offline"));
        }
        f(&mut inner.databases[self.db])
    }
}

fn wrong_type(key: &[u8]) -> Error {
    Error::new(ErrorKind::StoreOperation)
        .with_message(WRONGTYPE)
        .with_key(key)
}

fn require_values(command: &str, values: &[&[u8]]) -> Result<(), Error> {
    if values.is_empty() {
        return Err(Error::new(ErrorKind::StoreOperation).with_message(format!(
            "ERR wrong number of arguments for '{command}' command"
        )));
    }
    Ok(())
}

fn compile_pattern(pattern: &[u8]) -> Result<glob::Pattern, Error> {
    let text = pattern.to_str_lossy();
    glob::Pattern::new(&glob_syntax(&text)).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid key pattern `{text}`"))
            .with_source(err)
    })
}

/// Rewrites a Redis key pattern into `glob` syntax.
fn glob_syntax(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                let escaped = chars[i + 1];
                if matches!(escaped, '*' | '?' | '[' | ']') {
                    out.push('[');
                    out.push(escaped);
                    out.push(']');
                } else {
                    out.push(escaped);
                }
                i += 2;
            }
            // `glob` rejects `**` inside a component; Redis treats it as `*`.
            '*' => {
                out.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                i += 1;
            }
            '[' => {
                let negated = chars.get(i + 1) == Some(&'^');
                let start = if negated { i + 2 } else { i + 1 };
                // A leading `]` belongs to the class.
                let mut end = if chars.get(start) == Some(&']') {
                    start + 1
                } else {
                    start
                };
                while end < chars.len() && chars[end] != ']' {
                    end += 1;
                }
                if end >= chars.len() {
                    out.push_str("[[]");
                    i += 1;
                    continue;
                }
                out.push('[');
                if negated {
                    out.push('!');
                }
                out.extend(&chars[start..end]);
                out.push(']');
                i = end + 1;
            }
            ch => {
                out.push(ch);
                i += 1;
            }
        }
    }
    out
}

impl Commands for MemoryConnection {
    fn keys(&mut self, pattern: &[u8]) -> Result<Vec<BString>, Error> {
        let pattern = compile_pattern(pattern)?;
        self.with_keyspace(|keyspace| {
            Ok(keyspace
                .keys()
                .filter(|key| pattern.matches(&key.to_str_lossy()))
                .cloned()
                .collect())
        })
    }

    fn type_of(&mut self, key: &[u8]) -> Result<String, Error> {
        self.with_keyspace(|keyspace| {
            Ok(keyspace
                .get(key.as_bstr())
                .map(|entry| entry.tag().to_string())
                .unwrap_or_else(|| "none".to_string()))
        })
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<BString>, Error> {
        self.with_keyspace(|keyspace| match keyspace.get(key.as_bstr()) {
            None => Ok(None),
            Some(Entry::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn lrange(&mut self, key: &[u8]) -> Result<Vec<BString>, Error> {
        self.with_keyspace(|keyspace| match keyspace.get(key.as_bstr()) {
            None => Ok(Vec::new()),
            Some(Entry::List(values)) => Ok(values.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn smembers(&mut self, key: &[u8]) -> Result<Vec<BString>, Error> {
        self.with_keyspace(|keyspace| match keyspace.get(key.as_bstr()) {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn hgetall(&mut self, key: &[u8]) -> Result<Vec<(BString, BString)>, Error> {
        self.with_keyspace(|keyspace| match keyspace.get(key.as_bstr()) {
            None => Ok(Vec::new()),
            Some(Entry::Hash(fields)) => Ok(fields
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn zrange_with_scores(&mut self, key: &[u8]) -> Result<Vec<(BString, f64)>, Error> {
        self.with_keyspace(|keyspace| match keyspace.get(key.as_bstr()) {
            None => Ok(Vec::new()),
            Some(Entry::ZSet(members)) => {
                let mut pairs: Vec<(BString, f64)> = members
                    .iter()
                    .map(|(member, score)| (member.clone(), *score))
                    .collect();
                // ZRANGE order: score ascending, ties by member bytes.
                pairs.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                Ok(pairs)
            }
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.with_keyspace(|keyspace| {
            keyspace.insert(BString::from(key), Entry::String(BString::from(value)));
            Ok(())
        })
    }

    fn lpush(&mut self, key: &[u8], values: &[&[u8]]) -> Result<u64, Error> {
        require_values("lpush", values)?;
        self.with_keyspace(|keyspace| {
            let entry = keyspace
                .entry(BString::from(key))
                .or_insert_with(|| Entry::List(VecDeque::new()));
            let Entry::List(list) = entry else {
                return Err(wrong_type(key));
            };
            for value in values {
                list.push_front(BString::from(*value));
            }
            Ok(list.len() as u64)
        })
    }

    fn sadd(&mut self, key: &[u8], values: &[&[u8]]) -> Result<u64, Error> {
        require_values("sadd", values)?;
        self.with_keyspace(|keyspace| {
            let entry = keyspace
                .entry(BString::from(key))
                .or_insert_with(|| Entry::Set(BTreeSet::new()));
            let Entry::Set(set) = entry else {
                return Err(wrong_type(key));
            };
            let added = values
                .iter()
                .filter(|value| set.insert(BString::from(**value)))
                .count();
            Ok(added as u64)
        })
    }

    fn del(&mut self, keys: &[&[u8]]) -> Result<u64, Error> {
        require_values("del", keys)?;
        self.with_keyspace(|keyspace| {
            let removed = keys
                .iter()
                .filter(|key| keyspace.remove(key.as_bstr()).is_some())
                .count();
            Ok(removed as u64)
        })
    }
}

/// Opens connections to a shared `MemoryStore`; the server URL is ignored.
#[derive(Clone, Debug, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    fn connect(
        &self,
        _server: &ServerConfiguration,
        database: &Database,
    ) -> Result<Self::Connection, Error> {
        let index = database.index()?;
        self.store.connection(index as usize)
    }

    fn list_databases(&self, _server: &ServerConfiguration) -> Result<Vec<Database>, Error> {
        Ok((0..self.store.database_count())
            .map(|index| Database::new(index.to_string()))
            .collect())
    }
}
