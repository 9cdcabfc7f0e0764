//! Session handling and an authenticated HTTP client for the sales dashboard
//! API.
//!
//! A [`SessionStore`] holds the access token and user profile, persisting
//! them through a [`Storage`] so the session survives restarts. After
//! [`rehydrate()`] restores it, the [`guards`] decide which pages may be
//! visited, the [`ApiClient`] signs every request with the current token, and
//! the [`flows`] log users in and out.

#![forbid(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

mod client;
pub mod endpoints;
pub mod flows;
pub mod guards;
mod profile;
mod reconcile;
mod rehydrate;
pub mod routes;
mod session;
pub mod storage;
#[cfg(test)]
mod test_server;
pub mod validate;

pub use client::{authorize, extract_message, ApiClient, ApiError};
pub use profile::UserProfile;
pub use reconcile::{ProfileSource, ReconcileOutcome, Reconciler};
pub use rehydrate::rehydrate;
pub use session::{SessionStore, SessionView};
pub use storage::{FileStorage, MemoryStorage, Snapshot, Storage, StorageError};

/// The default user agent to use when communicating with the API.
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));
