//! Connection settings and session token handling.

mod config;
mod session;

pub use config::{ConfigError, SupabaseConfig};
pub use session::{parse_fragment, FragmentSession, SessionTokens};
