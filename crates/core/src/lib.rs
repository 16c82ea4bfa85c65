//! Mibu Core - Shared types and pure logic.
//!
//! This crate provides the common types used across the Mibu client
//! components:
//! - `client` - The SDK crate (session store, API client, caches)
//! - `integration-tests` - Cross-crate scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no storage access. This keeps it lightweight and allows it to be
//! used anywhere, including inside synchronous UI callbacks.
//!
//! # Modules
//!
//! - [`types`] - Roles, portals, users, collections, and type-safe IDs
//! - [`nav`] - The post-login navigation decision table
//! - [`geo`] - Geo samples, haversine distance, and the report throttle gate

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod geo;
pub mod nav;
pub mod types;

pub use geo::*;
pub use nav::*;
pub use types::*;
