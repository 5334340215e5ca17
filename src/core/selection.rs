//! Purpose: Collect keys for removal from a loaded result.
//! Exports: `KeySelection`.
//! Role: Caller-side boundary between a displayed `LoadResult` and a `RemoveKeys` executor.
//! Invariants: Every selected entry has a key identity, or selection fails.
//! Invariants: Loaded keys are taken byte for byte; whitespace-only keys are valid.
//! Invariants: Failures are `InvalidSelection` and surface before any executor runs.
use bstr::BString;
use std::collections::BTreeSet;

use crate::core::error::{Error, ErrorKind};
use crate::core::executor::Executor;
use crate::core::record::LoadResult;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeySelection {
    keys: BTreeSet<BString>,
}

impl KeySelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the records at `rows` (indices into `result.records()`).
    pub fn from_rows(result: &LoadResult, rows: &[usize]) -> Result<Self, Error> {
        let mut selection = Self::new();
        for &row in rows {
            let record = result.records().get(row).ok_or_else(|| {
                Error::new(ErrorKind::InvalidSelection).with_message(format!(
                    "row {row} is out of range ({} records loaded)",
                    result.len()
                ))
            })?;
            selection.keys.insert(record.key().clone());
        }
        Ok(selection)
    }

    /// Selects records by key; every key must be present in `result`.
    pub fn from_keys<I, K>(result: &LoadResult, keys: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut selection = Self::new();
        for key in keys {
            let key = key.as_ref();
            match result.get(key) {
                Some(record) => {
                    selection.keys.insert(record.key().clone());
                }
                None if key.is_empty() => return Err(no_key()),
                None => {
                    return Err(Error::new(ErrorKind::InvalidSelection)
                        .with_message("no loaded record for key")
                        .with_hint("Scan with a pattern that matches the key first.")
                        .with_key(key));
                }
            }
        }
        Ok(selection)
    }

    pub fn push(&mut self, key: BString) -> Result<(), Error> {
        if key.is_empty() {
            return Err(no_key());
        }
        self.keys.insert(key);
        Ok(())
    }

    pub fn keys(&self) -> &BTreeSet<BString> {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn into_executor(self) -> Executor {
        Executor::RemoveKeys(self.keys)
    }
}

fn no_key() -> Error {
    Error::new(ErrorKind::InvalidSelection).with_message("selected entry has no key")
}
