//! Mibu Client - SDK core for the Mibu travel companion app.
//!
//! # Architecture
//!
//! - The backend is the source of truth - NO local sync, direct API calls
//! - The [`session::SessionStore`] is the single mutable owner of the user
//!   record and bearer token; everything else reads through it
//! - Reference data is cached in-memory via `moka` with request coalescing;
//!   validity is session-lifetime (no TTL), cleared on logout
//! - UI concerns (rendering, navigation widgets, the deep-link dispatcher
//!   itself) live outside this crate and call in through the seams below
//!
//! # Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`api`] - REST API client and wire types
//! - [`storage`] - Persistent key-value storage abstraction
//! - [`session`] - Session store (user, token, language, collection)
//! - [`cache`] - Reference-data preload/avatar cache
//! - [`auth`] - Login orchestration, deep-link callbacks, role resolution
//! - [`location`] - Throttled location reporting
//!
//! # Example
//!
//! ```rust,ignore
//! use mibu_client::{api::ApiClient, auth::AuthFlow, config::MibuConfig};
//!
//! let config = MibuConfig::from_env()?;
//! let api = ApiClient::new(&config);
//!
//! // UI opens config-derived login URL in a browser, then the platform
//! // deep-link hook dispatches `mibu://auth/callback?...` into the flow.
//! let handle = dispatcher.subscribe();
//! let outcome = flow.login(Portal::Traveler, handle).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod location;
pub mod session;
pub mod storage;

pub use api::ApiClient;
pub use auth::AuthFlow;
pub use cache::PreloadService;
pub use config::MibuConfig;
pub use error::ApiError;
pub use session::SessionStore;
