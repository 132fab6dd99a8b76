//! # Auth user as returned by the backend
//!
//! [`SupabaseUser`] is the `user` object of the auth endpoints, trimmed to the
//! fields the app reads. [`SupabaseUser::to_identity`] projects it into the
//! [`Identity`] the stores work with.

use serde::{Deserialize, Serialize};
use store::Identity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupabaseUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl SupabaseUser {
    /// Convert to the client-side identity.
    pub fn to_identity(&self) -> Identity {
        Identity::new(self.id.clone(), self.email.clone().unwrap_or_default())
    }
}
