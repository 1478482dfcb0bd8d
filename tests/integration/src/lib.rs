//! Integration test utilities for the gateway client
//!
//! This crate provides an in-process mock gateway and mock REST API for
//! end-to-end tests of the connection lifecycle.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
