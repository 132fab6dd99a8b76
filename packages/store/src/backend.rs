//! # Backend capabilities consumed by the stores
//!
//! Persistence, authentication and file storage live in a hosted backend. The
//! stores only see the four traits below, so the same logic runs against the HTTP
//! adapter in the `api` crate or against [`crate::MemoryBackend`] in tests.
//!
//! | Trait | Capability |
//! |-------|-----------|
//! | [`AuthApi`] | Session check, credential sign-in/up/out, password changes, auth-state notifications. |
//! | [`TableApi`] | Row query/insert/upsert/update/delete on a named table. |
//! | [`StorageApi`] | Object upload/delete in a named bucket. |
//! | [`RpcApi`] | Privileged remote procedures (identity deletion). |
//!
//! [`Backend`] is the blanket combination every store is generic over.
//!
//! ## Auth-state notifications
//!
//! [`AuthEvents`] is the sending half an adapter keeps; each call to
//! [`AuthApi::on_auth_state_change`] hands out an [`AuthSubscription`] backed by a
//! `tokio::sync::broadcast` receiver. Dropping the subscription unsubscribes.

use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::models::Identity;

/// A table row as a JSON object keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Conjunction of column-equality predicates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add `column = value`.
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Whether a row satisfies every predicate.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }
}

/// Result ordering.
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

/// Kind of auth-state notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// Tagged auth-state notification.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub identity: Option<Identity>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, identity: Option<Identity>) -> Self {
        Self { kind, identity }
    }
}

const AUTH_EVENT_CAPACITY: usize = 32;

/// Sending half of the auth-state channel, owned by a backend adapter.
#[derive(Clone, Debug)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self { tx }
    }

    /// Broadcast to every live subscription. No subscribers is not an error.
    pub fn emit(&self, kind: AuthEventKind, identity: Option<Identity>) {
        let _ = self.tx.send(AuthEvent::new(kind, identity));
    }

    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of the auth-state channel.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    /// Next queued notification without waiting.
    ///
    /// Lagged notifications are skipped; only the newest state matters.
    pub fn try_next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "auth subscription lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Wait for the next notification. `None` once the sender is gone.
    pub async fn next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "auth subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// Outcome of a sign-up request.
#[derive(Clone, Debug, PartialEq)]
pub struct SignUpOutcome {
    pub identity: Option<Identity>,
    /// The backend sent a verification email; no session yet.
    pub confirmation_required: bool,
}

/// Authentication capability.
pub trait AuthApi {
    fn get_session(&self) -> impl std::future::Future<Output = Result<Option<Identity>>>;
    fn on_auth_state_change(&self) -> AuthSubscription;
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Identity>>;
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<SignUpOutcome>>;
    fn sign_out(&self) -> impl std::future::Future<Output = Result<()>>;
    fn update_password(&self, new_password: &str) -> impl std::future::Future<Output = Result<()>>;
    fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> impl std::future::Future<Output = Result<()>>;
}

/// Row storage capability.
pub trait TableApi {
    fn query(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> impl std::future::Future<Output = Result<Vec<Row>>>;
    /// Insert one row, returning it as stored.
    fn insert(&self, table: &str, row: Row) -> impl std::future::Future<Output = Result<Row>>;
    /// Insert or replace by primary key `id`, returning the stored row.
    fn upsert(&self, table: &str, row: Row) -> impl std::future::Future<Output = Result<Row>>;
    /// Apply `changes` to matching rows, returning the rows affected.
    fn update(
        &self,
        table: &str,
        filter: &Filter,
        changes: Row,
    ) -> impl std::future::Future<Output = Result<Vec<Row>>>;
    /// Delete matching rows, returning the rows removed.
    fn delete(
        &self,
        table: &str,
        filter: &Filter,
    ) -> impl std::future::Future<Output = Result<Vec<Row>>>;
}

/// Object storage capability.
pub trait StorageApi {
    /// Upload bytes and return the object's public URL.
    fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<String>>;
    fn delete_object(&self, bucket: &str, path: &str)
        -> impl std::future::Future<Output = Result<()>>;
}

/// Privileged remote procedures.
pub trait RpcApi {
    fn invoke_privileged(&self, name: &str) -> impl std::future::Future<Output = Result<()>>;
}

/// Everything the diary needs from its backend.
pub trait Backend: AuthApi + TableApi + StorageApi + RpcApi + Clone + 'static {}

impl<T> Backend for T where T: AuthApi + TableApi + StorageApi + RpcApi + Clone + 'static {}

/// Object path inside a bucket from its public URL (last two segments).
pub fn object_path_from_url(url: &str) -> Option<String> {
    let mut segments = url.trim_end_matches('/').rsplit('/');
    let file = segments.next().filter(|s| !s.is_empty())?;
    let folder = segments.next().filter(|s| !s.is_empty())?;
    Some(format!("{folder}/{file}"))
}

/// MIME type for an uploaded image, from its file extension.
pub fn image_content_type(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "image/png",
    }
}

/// Lower-cased extension of a file name, defaulting to `png`.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "png".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_all_conditions() {
        let mut row = Row::new();
        row.insert("id".into(), "e1".into());
        row.insert("user_id".into(), "u1".into());

        assert!(Filter::new().eq("id", "e1").eq("user_id", "u1").matches(&row));
        assert!(!Filter::new().eq("id", "e1").eq("user_id", "u2").matches(&row));
        assert!(Filter::new().matches(&row));
    }

    #[test]
    fn test_object_path_from_public_url() {
        assert_eq!(
            object_path_from_url(
                "https://x.supabase.co/storage/v1/object/public/avatars/u1/avatar-1.png"
            ),
            Some("u1/avatar-1.png".to_string())
        );
        assert_eq!(object_path_from_url("avatar.png"), None);
    }

    #[test]
    fn test_file_extension_defaults_to_png() {
        assert_eq!(file_extension("me.JPG"), "jpg");
        assert_eq!(file_extension("me"), "png");
        assert_eq!(image_content_type("jpeg"), "image/jpeg");
    }

    #[tokio::test]
    async fn test_subscription_receives_events_and_unsubscribes_on_drop() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();
        assert_eq!(events.subscriber_count(), 1);

        events.emit(AuthEventKind::SignedOut, None);
        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedOut);
        assert!(sub.try_next().is_none());

        sub.unsubscribe();
        assert_eq!(events.subscriber_count(), 0);
    }
}
