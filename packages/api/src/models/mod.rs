//! Wire models of the backend's auth endpoints.

mod user;

pub use user::SupabaseUser;
