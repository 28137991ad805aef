//! Command handlers.

pub mod config;
pub mod paths;
pub mod serve;
