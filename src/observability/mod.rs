//! Structured logging setup for the `cas-sso` server binary.

mod tracing_init;

pub use tracing_init::*;
