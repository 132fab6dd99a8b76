//! # Session Store
//!
//! Caches the signed-in [`Identity`] (or none) and a loading flag, kept in step
//! with the backend's auth-state notifications.
//!
//! Lifecycle: [`SessionStore::init`] runs one session check (a failure resolves to
//! "no identity") and then subscribes. Notifications are applied either by
//! draining with [`process_pending`](SessionStore::process_pending) or by awaiting
//! [`next_change`](SessionStore::next_change). [`teardown`](SessionStore::teardown)
//! unsubscribes.
//!
//! | Event | Effect on cached identity |
//! |-------|---------------------------|
//! | `SignedIn`, `UserUpdated`, `TokenRefreshed` | replaced by the event's identity |
//! | `SignedOut` | cleared |
//! | `PasswordRecovery` | cleared, and `password_recovery` raised so the UI shows the reset form |
//!
//! The store also carries the credential operations (sign in/up/out, password
//! change and recovery), validating input before anything reaches the backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::backend::{AuthApi, AuthEvent, AuthEventKind, AuthSubscription, SignUpOutcome};
use crate::config::AuthConfig;
use crate::error::{DiaryError, Result};
use crate::models::Identity;

/// Snapshot of the session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub loading: bool,
    /// A recovery link was followed; the password must be reset before use.
    pub password_recovery: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            identity: None,
            loading: true,
            password_recovery: false,
        }
    }
}

/// Holds the current identity and applies auth-state notifications.
#[derive(Clone)]
pub struct SessionStore<B: AuthApi> {
    backend: B,
    config: AuthConfig,
    state: Arc<RwLock<SessionState>>,
    subscription: Arc<tokio::sync::Mutex<Option<AuthSubscription>>>,
    muted: Arc<AtomicBool>,
}

impl<B: AuthApi> SessionStore<B> {
    pub fn new(backend: B, config: AuthConfig) -> Self {
        Self {
            backend,
            config,
            state: Arc::new(RwLock::new(SessionState::default())),
            subscription: Arc::new(tokio::sync::Mutex::new(None)),
            muted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state().identity
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    fn update(&self, f: impl FnOnce(&mut SessionState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    /// One-time session check, then subscribe to notifications.
    pub async fn init(&self) {
        let identity = match self.backend.get_session().await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!("Session check failed: {}", e);
                None
            }
        };
        self.update(|s| {
            s.identity = identity;
            s.loading = false;
        });

        let mut subscription = self.subscription.lock().await;
        if subscription.is_none() {
            *subscription = Some(self.backend.on_auth_state_change());
        }
    }

    /// Whether a notification subscription is live.
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .try_lock()
            .map(|s| s.is_some())
            .unwrap_or(true)
    }

    /// Apply one notification. Returns whether the cached identity changed.
    pub fn apply(&self, event: &AuthEvent) -> bool {
        if self.muted.load(Ordering::SeqCst) {
            tracing::debug!(kind = ?event.kind, "auth event ignored while muted");
            return false;
        }
        tracing::debug!(kind = ?event.kind, "auth event");

        let before = self.identity();
        self.update(|s| match event.kind {
            AuthEventKind::SignedIn => {
                s.identity = event.identity.clone();
                s.password_recovery = false;
            }
            AuthEventKind::UserUpdated | AuthEventKind::TokenRefreshed => {
                s.identity = event.identity.clone();
            }
            AuthEventKind::SignedOut => {
                s.identity = None;
                s.password_recovery = false;
            }
            AuthEventKind::PasswordRecovery => {
                s.identity = None;
                s.password_recovery = true;
            }
        });
        before != self.identity()
    }

    /// Apply every queued notification without waiting.
    ///
    /// Returns whether the cached identity changed. Does nothing when another
    /// task is already awaiting [`next_change`](Self::next_change).
    pub fn process_pending(&self) -> bool {
        let Ok(mut guard) = self.subscription.try_lock() else {
            return false;
        };
        let Some(subscription) = guard.as_mut() else {
            return false;
        };
        let mut changed = false;
        while let Some(event) = subscription.try_next() {
            changed |= self.apply(&event);
        }
        changed
    }

    /// Wait for the next notification and apply it.
    ///
    /// `None` when not subscribed or the backend closed the channel.
    pub async fn next_change(&self) -> Option<AuthEvent> {
        let mut guard = self.subscription.lock().await;
        let event = guard.as_mut()?.next().await?;
        self.apply(&event);
        Some(event)
    }

    /// Unsubscribe from notifications.
    pub async fn teardown(&self) {
        if let Some(subscription) = self.subscription.lock().await.take() {
            subscription.unsubscribe();
        }
    }

    /// Ignore notifications until the guard drops.
    ///
    /// Notifications that arrive meanwhile are consumed without effect.
    pub fn mute(&self) -> MuteGuard {
        self.muted.store(true, Ordering::SeqCst);
        MuteGuard {
            subscription: self.subscription.clone(),
            muted: self.muted.clone(),
        }
    }

    /// Forget the cached identity locally.
    pub fn clear(&self) {
        self.update(|s| {
            s.identity = None;
            s.password_recovery = false;
        });
    }

    fn check_password(&self, password: &str, confirm: &str) -> Result<()> {
        if password != confirm {
            return Err(DiaryError::validation("Passwords do not match."));
        }
        if password.chars().count() < self.config.min_password_len {
            return Err(DiaryError::validation(format!(
                "Password must be at least {} characters",
                self.config.min_password_len
            )));
        }
        Ok(())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(DiaryError::validation("Email and password are required"));
        }
        let identity = self.backend.sign_in_with_password(email, password).await?;
        self.update(|s| {
            s.identity = Some(identity.clone());
            s.password_recovery = false;
        });
        Ok(identity)
    }

    pub async fn sign_up(&self, email: &str, password: &str, confirm: &str) -> Result<SignUpOutcome> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(DiaryError::validation("Invalid email address"));
        }
        self.check_password(password, confirm)?;

        let outcome = match self.backend.sign_up(email, password).await {
            Ok(outcome) => outcome,
            Err(e) if e.message().contains("already registered") => {
                return Err(DiaryError::validation(
                    "This email is already registered. Please sign in instead.",
                ));
            }
            Err(e) => return Err(e),
        };
        if !outcome.confirmation_required {
            if let Some(identity) = &outcome.identity {
                self.update(|s| s.identity = Some(identity.clone()));
            }
        }
        Ok(outcome)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.backend.sign_out().await?;
        self.clear();
        Ok(())
    }

    pub async fn update_password(&self, new_password: &str, confirm: &str) -> Result<()> {
        self.check_password(new_password, confirm)?;
        self.backend.update_password(new_password).await
    }

    /// Send a password-reset email linking back to the configured redirect.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(DiaryError::validation("Email is required"));
        }
        self.backend
            .reset_password_for_email(email, &self.config.reset_redirect)
            .await
    }

    /// Set a new password from the recovery flow, then force a fresh sign-in.
    pub async fn complete_password_recovery(&self, new_password: &str, confirm: &str) -> Result<()> {
        self.check_password(new_password, confirm)?;
        self.backend.update_password(new_password).await?;
        self.sign_out().await
    }
}

/// Keeps a [`SessionStore`] muted; see [`SessionStore::mute`].
pub struct MuteGuard {
    subscription: Arc<tokio::sync::Mutex<Option<AuthSubscription>>>,
    muted: Arc<AtomicBool>,
}

impl Drop for MuteGuard {
    fn drop(&mut self) {
        // Drain what queued up while muted so it is not replayed afterwards.
        if let Ok(mut guard) = self.subscription.try_lock() {
            if let Some(subscription) = guard.as_mut() {
                while subscription.try_next().is_some() {}
            }
        }
        self.muted.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBackend, Operation};

    fn store(backend: &MemoryBackend) -> SessionStore<MemoryBackend> {
        SessionStore::new(backend.clone(), AuthConfig::default())
    }

    #[tokio::test]
    async fn test_init_resolves_existing_session() {
        let backend = MemoryBackend::new();
        backend.register("ana@example.com", "secret1").unwrap();
        let identity = backend
            .sign_in_with_password("ana@example.com", "secret1")
            .await
            .unwrap();

        let session = store(&backend);
        assert!(session.is_loading());
        session.init().await;

        assert!(!session.is_loading());
        assert_eq!(session.identity(), Some(identity));
        assert!(session.is_subscribed());
    }

    #[tokio::test]
    async fn test_failed_session_check_means_signed_out() {
        let backend = MemoryBackend::new();
        backend.fail(Operation::GetSession, "network down");

        let session = store(&backend);
        session.init().await;

        assert_eq!(
            session.state(),
            SessionState {
                identity: None,
                loading: false,
                password_recovery: false,
            }
        );
    }

    #[tokio::test]
    async fn test_notifications_replace_identity() {
        let backend = MemoryBackend::new();
        backend.register("ana@example.com", "secret1").unwrap();
        let session = store(&backend);
        session.init().await;

        let identity = backend
            .sign_in_with_password("ana@example.com", "secret1")
            .await
            .unwrap();
        assert!(session.process_pending());
        assert_eq!(session.identity(), Some(identity.clone()));

        backend.refresh_token();
        assert!(!session.process_pending());
        assert_eq!(session.identity(), Some(identity));

        backend.sign_out().await.unwrap();
        let event = session.next_change().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedOut);
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_password_recovery_clears_identity() {
        let backend = MemoryBackend::new();
        backend.register("ana@example.com", "secret1").unwrap();
        let session = store(&backend);
        session.init().await;

        backend.start_recovery("ana@example.com").unwrap();
        session.process_pending();

        let state = session.state();
        assert!(state.identity.is_none());
        assert!(state.password_recovery);

        session
            .complete_password_recovery("newpass1", "newpass1")
            .await
            .unwrap();
        session.process_pending();
        assert!(!session.state().password_recovery);
        assert!(session
            .sign_in("ana@example.com", "newpass1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_teardown_unsubscribes() {
        let backend = MemoryBackend::new();
        let session = store(&backend);
        session.init().await;
        assert_eq!(backend.subscriber_count(), 1);

        session.teardown().await;
        assert_eq!(backend.subscriber_count(), 0);
        assert!(!session.is_subscribed());
        assert!(session.next_change().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_up_validates_before_calling_backend() {
        let backend = MemoryBackend::new();
        let session = store(&backend);

        let err = session
            .sign_up("ana@example.com", "secret1", "secret2")
            .await
            .unwrap_err();
        assert_eq!(err, DiaryError::validation("Passwords do not match."));

        let err = session
            .sign_up("ana@example.com", "abc", "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, DiaryError::Validation(_)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_reports_existing_account() {
        let backend = MemoryBackend::new();
        backend.register("ana@example.com", "secret1").unwrap();
        let session = store(&backend);

        let err = session
            .sign_up("ana@example.com", "secret1", "secret1")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DiaryError::validation("This email is already registered. Please sign in instead.")
        );
    }

    #[tokio::test]
    async fn test_sign_up_signs_in() {
        let backend = MemoryBackend::new();
        let session = store(&backend);
        let outcome = session
            .sign_up("bo@example.com", "secret1", "secret1")
            .await
            .unwrap();
        assert!(!outcome.confirmation_required);
        assert_eq!(session.identity(), outcome.identity);
    }

    #[tokio::test]
    async fn test_muted_store_ignores_and_drains_notifications() {
        let backend = MemoryBackend::new();
        backend.register("ana@example.com", "secret1").unwrap();
        let session = store(&backend);
        session.init().await;
        session.sign_in("ana@example.com", "secret1").await.unwrap();
        session.process_pending();

        {
            let _mute = session.mute();
            backend.sign_out().await.unwrap();
            assert!(!session.process_pending());
            backend.sign_out().await.unwrap();
        }
        assert!(session.identity().is_some());
        assert!(!session.process_pending());
    }

    #[tokio::test]
    async fn test_reset_request_uses_configured_redirect() {
        let backend = MemoryBackend::new();
        let session = SessionStore::new(
            backend.clone(),
            AuthConfig {
                reset_redirect: "https://diary.example/".into(),
                ..AuthConfig::default()
            },
        );
        session.request_password_reset(" ana@example.com ").await.unwrap();
        assert_eq!(
            backend.reset_requests(),
            vec![("ana@example.com".to_string(), "https://diary.example/".to_string())]
        );
    }
}
