//! Configuration: file types, loading, validation and MAC handling.

pub mod mac;
pub mod persistence;
pub mod types;
