//! CLI command implementations

pub mod capacity;
pub mod configure;
