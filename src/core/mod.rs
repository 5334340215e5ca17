// Engine core: data model, capability seam, loader, executors, and stores.
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod load;
pub mod memory;
pub mod record;
pub mod resp;
pub mod selection;
pub mod tree;
