//! Backend connection settings from environment variables.

use reqwest::Url;
use thiserror::Error;

/// Why the backend settings could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

/// Project URL and public (anonymous) API key.
#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseConfig {
    pub url: Url,
    pub anon_key: String,
}

impl SupabaseConfig {
    pub fn new(url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        if anon_key.trim().is_empty() {
            return Err(ConfigError::Missing("SUPABASE_ANON_KEY"));
        }
        let url = Url::parse(url.trim()).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }
        Ok(Self {
            url,
            anon_key: anon_key.trim().to_string(),
        })
    }

    /// Read `SUPABASE_URL` and `SUPABASE_ANON_KEY`, loading `.env` first.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let url = std::env::var("SUPABASE_URL").map_err(|_| ConfigError::Missing("SUPABASE_URL"))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?;
        Self::new(&url, &anon_key)
    }

    /// Values baked in when the crate was compiled; the only source in the browser.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        let url = option_env!("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let anon_key =
            option_env!("SUPABASE_ANON_KEY").ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?;
        Self::new(url, anon_key)
    }

    /// Runtime environment where there is one, falling back to build-time values.
    pub fn load() -> Result<Self, ConfigError> {
        #[cfg(not(target_arch = "wasm32"))]
        let runtime = Self::from_env();
        #[cfg(target_arch = "wasm32")]
        let runtime = Err(ConfigError::Missing("SUPABASE_URL"));

        runtime.or_else(|_| Self::from_build_env())
    }

    /// Absolute URL for a path under the project root.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Public URL of an object in a public bucket.
    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!("storage/v1/object/public/{bucket}/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = SupabaseConfig::new("https://abc.supabase.co/", "anon").unwrap();
        assert_eq!(
            config.endpoint("/auth/v1/user"),
            "https://abc.supabase.co/auth/v1/user"
        );
        assert_eq!(
            config.public_object_url("avatars", "u1/avatar-1.png"),
            "https://abc.supabase.co/storage/v1/object/public/avatars/u1/avatar-1.png"
        );
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert_eq!(
            SupabaseConfig::new("https://abc.supabase.co", " "),
            Err(ConfigError::Missing("SUPABASE_ANON_KEY"))
        );
        assert!(matches!(
            SupabaseConfig::new("not a url", "anon"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            SupabaseConfig::new("ftp://abc.supabase.co", "anon"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}
