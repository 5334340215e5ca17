//! Purpose: Narrow command capability the engine consumes from a store connection.
//! Exports: `Commands`.
//! Role: The only seam between engine logic and any concrete store client.
//! Invariants: Keys are opaque bytes; implementations must not re-encode them.
//! Invariants: Implementations surface faults as `Error`, never panic.
use bstr::BString;

use crate::core::error::Error;

/// Key enumeration, type lookup, and per-type read/write primitives.
///
/// Each method maps to one store command. Connections are stateful, hence
/// `&mut self`.
pub trait Commands {
    /// Keys matching a glob pattern, in store order.
    fn keys(&mut self, pattern: &[u8]) -> Result<Vec<BString>, Error>;

    /// Native type tag (`string`, `list`, ..., or a tag the engine does not model).
    fn type_of(&mut self, key: &[u8]) -> Result<String, Error>;

    /// `None` when the key is absent.
    fn get(&mut self, key: &[u8]) -> Result<Option<BString>, Error>;

    fn lrange(&mut self, key: &[u8]) -> Result<Vec<BString>, Error>;

    fn smembers(&mut self, key: &[u8]) -> Result<Vec<BString>, Error>;

    fn hgetall(&mut self, key: &[u8]) -> Result<Vec<(BString, BString)>, Error>;

    fn zrange_with_scores(&mut self, key: &[u8]) -> Result<Vec<(BString, f64)>, Error>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error>;

    /// Returns the list length after the push.
    fn lpush(&mut self, key: &[u8], values: &[&[u8]]) -> Result<u64, Error>;

    /// Returns the number of members newly added.
    fn sadd(&mut self, key: &[u8], values: &[&[u8]]) -> Result<u64, Error>;

    /// Returns the number of keys that existed.
    fn del(&mut self, keys: &[&[u8]]) -> Result<u64, Error>;
}
