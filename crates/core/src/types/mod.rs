//! Shared domain types.
//!
//! # Modules
//!
//! - [`id`] - Newtype wrappers for opaque string IDs
//! - [`role`] - Roles, portals, auth providers, and languages
//! - [`user`] - The session user record and collection items

pub mod id;
pub mod role;
pub mod user;

pub use id::*;
pub use role::*;
pub use user::*;
