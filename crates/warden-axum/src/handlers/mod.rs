//! HTTP request handlers for the Axum web server.
//!
//! Each submodule contains handlers for one API area.

pub mod config;
pub mod console;
pub mod events;
pub mod server;
pub mod system;
