//! Cash.io node library.
//!
//! Hosts the commitment tree and blob store behind a service facade, and
//! runs the ingest task that applies deposits in order. Used by the
//! `cashio-node` binary and by tests.

pub mod cli;
pub mod config;
pub mod node;
pub mod service;
pub mod shutdown;
