//! Mapping of HTTP failures onto [`DiaryError`].

use serde_json::Value;
use store::DiaryError;

/// Which family of endpoints answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Auth,
    Data,
}

/// Error for a non-2xx response, carrying the backend's own message.
///
/// Auth endpoints answer rejected credentials with 400/422, so on that surface
/// every client error is an auth failure.
pub fn status_error(surface: Surface, status: u16, body: &str) -> DiaryError {
    let message =
        backend_message(body).unwrap_or_else(|| format!("Request failed with status {status}"));
    match (surface, status) {
        (_, 401 | 403) => DiaryError::Auth(message),
        (Surface::Auth, 400..=499) => DiaryError::Auth(message),
        (Surface::Data, 404) => DiaryError::NotFound(message),
        _ => DiaryError::Remote(message),
    }
}

/// Transport failure: the request never got an answer.
pub fn transport_error(e: reqwest::Error) -> DiaryError {
    DiaryError::remote(format!("Network error: {e}"))
}

fn backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_client_errors_are_auth() {
        let err = status_error(
            Surface::Auth,
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err, DiaryError::auth("Invalid login credentials"));

        let err = status_error(Surface::Auth, 422, r#"{"code":422,"msg":"User already registered"}"#);
        assert_eq!(err, DiaryError::auth("User already registered"));
    }

    #[test]
    fn test_data_errors() {
        let err = status_error(Surface::Data, 404, r#"{"message":"relation does not exist"}"#);
        assert_eq!(err, DiaryError::not_found("relation does not exist"));
        let err = status_error(Surface::Data, 403, "");
        assert_eq!(err, DiaryError::auth("Request failed with status 403"));
        let err = status_error(Surface::Data, 500, "<html>");
        assert!(matches!(err, DiaryError::Remote(_)));
    }
}
