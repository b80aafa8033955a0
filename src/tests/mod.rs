//! Cross-module tests.
//!
//! These drive the full router against a mocked CAS server.

mod cas_flow;
