//! Warden SCIM — SCIM 2.0 provisioning surface over the reconciliation
//! engine.
//!
//! Users and Groups are projections of remote directory state: a Group is a
//! group-mapping entry whose membership is computed on read from grants,
//! never stored. Every mutation funnels through the engine's grant-diff
//! primitive.

pub mod models;
pub mod router;
pub mod service;
