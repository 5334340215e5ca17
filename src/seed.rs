//! Purpose: Load a JSON keyspace file into an in-process store for `--memory` runs.
//! Exports: `load_seed_file`.
//! Role: CLI-only helper; the library never reads seed files.
//! Invariants: List values are given head first, exactly as `scan` prints them.
//! Invariants: A file that fails to parse leaves the store untouched.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use keyscope::api::{Error, ErrorKind, MemoryStore};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
enum SeedValue {
    String(String),
    List(Vec<String>),
    Set(Vec<String>),
    Hash(BTreeMap<String, String>),
    Zset(Vec<SeedMember>),
    Stream,
}

#[derive(Debug, Deserialize)]
struct SeedMember {
    member: String,
    score: f64,
}

pub(super) fn load_seed_file(store: &MemoryStore, database: usize, path: &Path) -> Result<usize, Error> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read seed file {}", path.display()))
            .with_source(err)
    })?;
    let keys = parse_seed(&text)?;
    let mut conn = store.connection(database)?;
    let count = keys.len();
    for (key, value) in keys {
        match value {
            SeedValue::String(value) => conn.seed_string(&key, &value),
            SeedValue::List(mut values) => {
                values.reverse();
                conn.seed_list(&key, &values);
            }
            SeedValue::Set(members) => conn.seed_set(&key, &members),
            SeedValue::Hash(fields) => {
                let fields: Vec<(String, String)> = fields.into_iter().collect();
                conn.seed_hash(&key, &fields);
            }
            SeedValue::Zset(members) => {
                let members: Vec<(String, f64)> = members
                    .into_iter()
                    .map(|entry| (entry.member, entry.score))
                    .collect();
                conn.seed_zset(&key, &members);
            }
            SeedValue::Stream => conn.seed_other(&key, "stream"),
        }
    }
    tracing::debug!(path = %path.display(), database, keys = count, "loaded seed file");
    Ok(count)
}

fn parse_seed(text: &str) -> Result<BTreeMap<String, SeedValue>, Error> {
    serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid seed file: {err}"))
            .with_hint(r#"Expected {"key": {"type": "string|list|set|hash|zset|stream", "value": ...}}."#)
            .with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::{load_seed_file, parse_seed};
    use keyscope::api::{Commands, ErrorKind, MemoryStore};
    use std::io::Write;

    #[test]
    fn lists_keep_written_order() {
        let store = MemoryStore::new();
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"todos": {{"type": "list", "value": ["sleep", "drink", "code"]}},
                "status": {{"type": "string", "value": "online"}},
                "reviews": {{"type": "zset", "value": [{{"member": "maths", "score": 15}}]}},
                "events": {{"type": "stream"}}}}"#
        )
        .expect("write seed");

        let count = load_seed_file(&store, 2, file.path()).expect("seed");
        assert_eq!(count, 4);

        let mut conn = store.connection(2).expect("db");
        assert_eq!(conn.lrange(b"todos").unwrap(), ["sleep", "drink", "code"]);
        assert_eq!(conn.get(b"status").unwrap().unwrap(), "online");
        assert_eq!(conn.type_of(b"events").unwrap(), "stream");
        assert!(store.connection(0).expect("db").keys(b"*").unwrap().is_empty());
    }

    #[test]
    fn unknown_type_tag_is_usage_error() {
        let err = parse_seed(r#"{"k": {"type": "json", "value": 1}}"#).expect_err("bad tag");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn missing_file_is_io_error() {
        let store = MemoryStore::new();
        let err = load_seed_file(&store, 0, std::path::Path::new("/nonexistent/seed.json"))
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
