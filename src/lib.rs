//! CAS single-sign-on client.
//!
//! The [`cas`] module is the protocol engine and has no server dependencies.
//! With the `server` feature the crate also provides an axum host surface
//! ([`routes`]) and the `cas-sso` binary.

pub mod cas;
pub mod config;
#[cfg(feature = "server")]
pub mod observability;
#[cfg(feature = "server")]
pub mod routes;

#[cfg(all(test, feature = "server"))]
mod tests;
