//! Warden Core — configuration, domain models, CSV roster parsing, and the
//! desired-state builder for directory reconciliation.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod names;
pub mod roster;
