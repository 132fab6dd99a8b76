//! Tokens of the signed-in session, and recovery links carried in a URL fragment.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use store::{DiaryError, Result};

use crate::models::SupabaseUser;

/// Access/refresh token pair plus the user it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user: Option<SupabaseUser>,
}

/// What a `#access_token=…` fragment carried.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    /// `type=` parameter: `recovery`, `signup`, `magiclink`, …
    pub kind: Option<String>,
}

impl FragmentSession {
    pub fn is_recovery(&self) -> bool {
        self.kind.as_deref() == Some("recovery")
    }
}

/// Parse an auth redirect fragment (with or without the leading `#`).
///
/// `Ok(None)` when the fragment holds no tokens, such as an ordinary route.
/// An `error_description` in the fragment (expired link) is an auth error.
pub fn parse_fragment(fragment: &str) -> Result<Option<FragmentSession>> {
    let fragment = fragment.trim_start_matches('#');
    let parsed = Url::parse(&format!("http://fragment.local/?{fragment}"))
        .map_err(|e| DiaryError::validation(format!("Malformed link: {e}")))?;

    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_in = None;
    let mut kind = None;
    let mut error = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "refresh_token" => refresh_token = Some(value.into_owned()),
            "expires_in" => expires_in = value.parse().ok(),
            "type" => kind = Some(value.into_owned()),
            "error_description" => error = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(DiaryError::auth(error));
    }
    let Some(access_token) = access_token else {
        return Ok(None);
    };
    Ok(Some(FragmentSession {
        access_token,
        refresh_token: refresh_token.unwrap_or_default(),
        expires_in,
        kind,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_fragment() {
        let session = parse_fragment(
            "#access_token=abc.def&expires_in=3600&refresh_token=r1&token_type=bearer&type=recovery",
        )
        .unwrap()
        .unwrap();
        assert_eq!(session.access_token, "abc.def");
        assert_eq!(session.refresh_token, "r1");
        assert_eq!(session.expires_in, Some(3600));
        assert!(session.is_recovery());
    }

    #[test]
    fn test_route_fragment_has_no_session() {
        assert_eq!(parse_fragment("#/profile").unwrap(), None);
        assert_eq!(parse_fragment("").unwrap(), None);
    }

    #[test]
    fn test_expired_link_is_auth_error() {
        let err = parse_fragment(
            "error=access_denied&error_code=otp_expired&error_description=Email+link+is+invalid+or+has+expired",
        )
        .unwrap_err();
        assert_eq!(err, DiaryError::auth("Email link is invalid or has expired"));
    }
}
