//! `warden` command-line interface.
//!
//! Parsing and configuration assembly live here so they can be tested; the
//! binary in `main.rs` only initialises logging and dispatches.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by main.rs
use dotenvy as _;
use tracing_subscriber as _;

pub mod handlers;
pub mod parser;

pub use parser::{Cli, Commands, ServeArgs};
