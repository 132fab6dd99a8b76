//! # Application configuration: `diary.toml`
//!
//! Names the remote resources the stores talk to and the client-side auth policy.
//! A missing, empty or malformed file is equivalent to [`DiaryConfig::default`].
//! The web app takes the file's text from `DIARY_CONFIG` at build time. A
//! relative `reset_redirect` is resolved against the page the app is served from.
//!
//! ```toml
//! [tables]
//! entries = "diary_entries"
//! profiles = "profiles"
//!
//! [storage]
//! avatars = "avatars"
//! entry_images = "entry-images"
//!
//! [auth]
//! delete_user_rpc = "delete_user"
//! reset_redirect = "/"
//! min_password_len = 6
//! ```

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiaryConfig {
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TablesConfig {
    #[serde(default = "default_entries_table")]
    pub entries: String,
    #[serde(default = "default_profiles_table")]
    pub profiles: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_avatar_bucket")]
    pub avatars: String,
    #[serde(default = "default_image_bucket")]
    pub entry_images: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Privileged procedure that deletes the calling identity.
    #[serde(default = "default_delete_user_rpc")]
    pub delete_user_rpc: String,
    /// Where the password-reset email links back to.
    #[serde(default = "default_reset_redirect")]
    pub reset_redirect: String,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

fn default_entries_table() -> String {
    "diary_entries".to_string()
}

fn default_profiles_table() -> String {
    "profiles".to_string()
}

fn default_avatar_bucket() -> String {
    "avatars".to_string()
}

fn default_image_bucket() -> String {
    "entry-images".to_string()
}

fn default_delete_user_rpc() -> String {
    "delete_user".to_string()
}

fn default_reset_redirect() -> String {
    "/".to_string()
}

fn default_min_password_len() -> usize {
    6
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            entries: default_entries_table(),
            profiles: default_profiles_table(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            avatars: default_avatar_bucket(),
            entry_images: default_image_bucket(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            delete_user_rpc: default_delete_user_rpc(),
            reset_redirect: default_reset_redirect(),
            min_password_len: default_min_password_len(),
        }
    }
}

impl DiaryConfig {
    /// Parse `diary.toml` text. Absent or malformed text yields the defaults.
    pub fn from_toml_or_default(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return Self::default();
        };
        Self::from_toml(text).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed diary config: {}", e);
            Self::default()
        })
    }

    /// Parse from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Make a relative reset redirect absolute against the page the app is served from.
    pub fn resolve_reset_redirect(mut self, base_url: &str) -> Self {
        let redirect = &self.auth.reset_redirect;
        if !redirect.contains("://") {
            self.auth.reset_redirect = format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                redirect.trim_start_matches('/')
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(DiaryConfig::from_toml("").unwrap(), DiaryConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = DiaryConfig::from_toml(
            r#"
            [storage]
            avatars = "profile-pictures"

            [auth]
            min_password_len = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.avatars, "profile-pictures");
        assert_eq!(config.storage.entry_images, "entry-images");
        assert_eq!(config.auth.min_password_len, 10);
        assert_eq!(config.auth.delete_user_rpc, "delete_user");
        assert_eq!(config.tables.entries, "diary_entries");
    }

    #[test]
    fn test_malformed_toml_falls_back_to_defaults() {
        assert_eq!(
            DiaryConfig::from_toml_or_default(Some("[auth\nmin_password_len = ")),
            DiaryConfig::default()
        );
        assert_eq!(DiaryConfig::from_toml_or_default(None), DiaryConfig::default());
    }

    #[test]
    fn test_reset_redirect_resolves_against_page() {
        let config = DiaryConfig::default().resolve_reset_redirect("https://diary.example/app/");
        assert_eq!(config.auth.reset_redirect, "https://diary.example/app/");

        let config = DiaryConfig::from_toml("[auth]\nreset_redirect = \"reset\"")
            .unwrap()
            .resolve_reset_redirect("https://diary.example");
        assert_eq!(config.auth.reset_redirect, "https://diary.example/reset");

        let config = DiaryConfig::from_toml("[auth]\nreset_redirect = \"https://other.example/\"")
            .unwrap()
            .resolve_reset_redirect("https://diary.example/app/");
        assert_eq!(config.auth.reset_redirect, "https://other.example/");
    }
}
