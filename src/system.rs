//! External tool plumbing: subprocess execution and output parsing.

pub mod executor;
pub mod parser;
