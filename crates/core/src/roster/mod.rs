//! CSV roster/mapping parsing and the desired-state builder.

pub mod desired;
pub mod rows;
