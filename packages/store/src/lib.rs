//! Domain core of the diary: models, stores and the backend capability traits.
//!
//! The crate holds no network code. Remote persistence, authentication and file
//! storage are reached through the traits in [`backend`]; the `api` crate
//! implements them over HTTP and [`MemoryBackend`] implements them in memory.
//!
//! | Component | Role |
//! |-----------|------|
//! | [`SessionStore`] | Current identity and loading flag, fed by auth notifications. |
//! | [`EntryStore`] | The identity's entries, re-fetched after every change. |
//! | [`ProfileStore`] | Username and avatar. |
//! | [`AccountLifecycle`] | Password-gated account deletion. |
//! | [`Diary`] | Wires the above to one backend and keeps them in step. |

pub mod account;
pub mod backend;
pub mod config;
pub mod diary;
pub mod entries;
pub mod error;
pub mod models;
pub mod profile;
pub mod session;

#[cfg(not(target_arch = "wasm32"))]
mod memory;
#[cfg(not(target_arch = "wasm32"))]
mod password;

#[cfg(not(target_arch = "wasm32"))]
pub use memory::{row, timestamp, MemoryBackend, Operation, DELETE_USER_RPC};

pub use account::{AccountLifecycle, CleanupStep, CleanupWarning, DeletionPhase, DeletionReport};
pub use backend::{
    AuthApi, AuthEvent, AuthEventKind, AuthEvents, AuthSubscription, Backend, Filter, Order, Row,
    RpcApi, SignUpOutcome, StorageApi, TableApi,
};
pub use config::DiaryConfig;
pub use diary::{Diary, DiarySnapshot};
pub use entries::EntryStore;
pub use error::{DiaryError, Result};
pub use models::{Category, DiaryEntry, EntryDraft, EntryPatch, Identity, Profile};
pub use profile::ProfileStore;
pub use session::{MuteGuard, SessionState, SessionStore};
