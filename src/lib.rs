//! Purpose: Keyspace browsing and mutation engine for Redis-like stores.
//! Exports: `api` (public surface), `core` (engine internals), `notice`.
//! Role: Library backing the `keyscope` CLI and its tests.
//! Invariants: The engine depends only on the `Commands` capability, never on a concrete client.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
pub mod notice;
