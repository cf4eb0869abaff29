//! Warden Sync — remote directory client, actual-state snapshot, and the
//! reconciliation engine.
//!
//! This crate owns the single grant-diff primitive shared by the bulk CSV
//! path and the SCIM adapter, plus the content-hash result cache backed by
//! object storage.

pub mod client;
pub mod engine;
pub mod hash;
pub mod models;
pub mod snapshot;
pub mod store;
