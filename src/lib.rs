//! Vault task synchronization library.
//!
//! Keeps a local task list and a plain-text vault mirror reconciled:
//! quoted-CSV record files, a timestamp-and-status merge engine, a
//! revocable capability layer over the vault directory, and a per-day
//! digest note that round-trips human checkbox edits.

pub mod codec;
pub mod config;
pub mod daily;
pub mod error;
pub mod links;
pub mod logging;
pub mod merge;
pub mod store;
pub mod sync;
pub mod types;
pub mod vault;
