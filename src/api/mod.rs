//! Purpose: Define the public Rust API boundary for keyscope.
//! Exports: Engine entry points, data model, capability trait, and connectors.
//! Role: Stable, additive-only surface used by the CLI and integration tests.
//! Invariants: Callers reach store clients only through `Connector` and `Commands`.

mod connection;

pub use crate::core::commands::Commands;
pub use crate::core::config::{Database, Endpoint, ServerConfiguration, Vendor};
pub use crate::core::engine::{Connector, Engine, MATCH_ALL, Query, scan};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind, error_trace};
pub use crate::core::executor::{ExecutionOutcome, Executor, MutationInput};
pub use crate::core::memory::{MemoryConnection, MemoryConnector, MemoryStore};
pub use crate::core::record::{KeyType, LoadResult, Record, ScoredMember, Value};
pub use crate::core::resp::{Frame, encode_command, read_frame};
pub use crate::core::selection::KeySelection;
pub use crate::core::tree::{KeyNode, KeyTree};
pub use connection::{ConnectOptions, RespConnection, RespConnector};
