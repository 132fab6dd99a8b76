//! # API crate: the hosted backend adapter
//!
//! Authentication, row storage, object storage and privileged procedures all live
//! in a hosted backend-as-a-service. This crate talks to it over HTTP and exposes
//! the result through the capability traits the `store` crate is generic over.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Connection settings (`SupabaseConfig`), session tokens, recovery-link parsing |
//! | [`client`] | [`SupabaseClient`], implementing `AuthApi`, `TableApi`, `StorageApi` and `RpcApi` |
//! | [`db`] | Query-string encoding of row filters and ordering |
//! | [`error`] | HTTP status to `DiaryError` mapping |
//! | [`models`] | Auth user payload and its projection to `Identity` |

pub mod auth;
pub mod client;
pub mod db;
pub mod error;
pub mod models;

pub use auth::{ConfigError, SessionTokens, SupabaseConfig};
pub use client::SupabaseClient;
pub use models::SupabaseUser;
