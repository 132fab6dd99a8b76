//! `Diary`: one backend handle and one config, wired into every store.
//!
//! The Session Store only tracks the identity; `Diary` is what keeps the Entry
//! and Profile stores following it. Every path that can change the identity
//! ([`start`](Diary::start), [`next_change`](Diary::next_change),
//! [`process_pending`](Diary::process_pending) and the sign-in/out helpers) ends
//! with a re-sync.

use crate::account::{AccountLifecycle, DeletionPhase};
use crate::backend::{AuthEvent, Backend, SignUpOutcome};
use crate::config::DiaryConfig;
use crate::entries::EntryStore;
use crate::error::Result;
use crate::models::{DiaryEntry, Identity, Profile};
use crate::profile::ProfileStore;
use crate::session::{SessionState, SessionStore};

/// Everything the presentation layer renders from, captured at one instant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiarySnapshot {
    pub session: SessionState,
    pub entries: Vec<DiaryEntry>,
    pub entries_loading: bool,
    pub profile: Option<Profile>,
    pub deletion: DeletionPhase,
}

#[derive(Clone)]
pub struct Diary<B: Backend> {
    backend: B,
    config: DiaryConfig,
    session: SessionStore<B>,
    entries: EntryStore<B>,
    profile: ProfileStore<B>,
    account: AccountLifecycle<B>,
}

impl<B: Backend> Diary<B> {
    pub fn new(backend: B, config: DiaryConfig) -> Self {
        let session = SessionStore::new(backend.clone(), config.auth.clone());
        let entries = EntryStore::new(backend.clone(), &config);
        let profile = ProfileStore::new(backend.clone(), &config);
        let account = AccountLifecycle::new(
            backend.clone(),
            &config,
            session.clone(),
            entries.clone(),
            profile.clone(),
        );
        Self {
            backend,
            config,
            session,
            entries,
            profile,
            account,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &DiaryConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore<B> {
        &self.session
    }

    pub fn entries(&self) -> &EntryStore<B> {
        &self.entries
    }

    pub fn profile(&self) -> &ProfileStore<B> {
        &self.profile
    }

    pub fn account(&self) -> &AccountLifecycle<B> {
        &self.account
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    pub fn snapshot(&self) -> DiarySnapshot {
        DiarySnapshot {
            session: self.session.state(),
            entries: self.entries.list(),
            entries_loading: self.entries.is_loading(),
            profile: self.profile.current(),
            deletion: self.account.phase(),
        }
    }

    /// Initial session check, subscription and first entry fetch.
    pub async fn start(&self) -> Result<()> {
        self.session.init().await;
        tracing::info!(signed_in = self.session.identity().is_some(), "diary started");
        self.sync().await
    }

    /// Point the Entry and Profile stores at the current identity.
    async fn sync(&self) -> Result<()> {
        let identity = self.session.identity();
        if identity.is_none() {
            self.profile.clear();
        }
        self.entries.set_identity(identity).await
    }

    /// Wait for the next auth notification, apply it and re-sync.
    ///
    /// `Ok(None)` once the subscription is gone.
    pub async fn next_change(&self) -> Result<Option<AuthEvent>> {
        let Some(event) = self.session.next_change().await else {
            return Ok(None);
        };
        self.sync().await?;
        Ok(Some(event))
    }

    /// Apply queued notifications; re-sync if the identity changed.
    pub async fn process_pending(&self) -> Result<bool> {
        let changed = self.session.process_pending();
        if changed {
            self.sync().await?;
        }
        Ok(changed)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = self.session.sign_in(email, password).await?;
        self.sync().await?;
        Ok(identity)
    }

    pub async fn sign_up(&self, email: &str, password: &str, confirm: &str) -> Result<SignUpOutcome> {
        let outcome = self.session.sign_up(email, password, confirm).await?;
        self.sync().await?;
        Ok(outcome)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.session.sign_out().await?;
        self.sync().await
    }

    /// Unsubscribe from auth notifications.
    pub async fn shutdown(&self) {
        self.session.teardown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AuthApi;
    use crate::memory::{MemoryBackend, Operation};
    use crate::models::{Category, EntryDraft};

    #[tokio::test]
    async fn test_entries_follow_identity_through_notifications() {
        let backend = MemoryBackend::new();
        backend.register("ana@example.com", "secret1").unwrap();
        let diary = Diary::new(backend.clone(), DiaryConfig::default());
        diary.start().await.unwrap();
        assert!(diary.entries().owner().is_none());

        // Signing in through the backend directly arrives as a notification only.
        backend
            .sign_in_with_password("ana@example.com", "secret1")
            .await
            .unwrap();
        assert!(diary.process_pending().await.unwrap());
        assert!(diary.entries().owner().is_some());

        diary
            .entries()
            .create(EntryDraft::new("Paris", "trip", Category::Travel))
            .await
            .unwrap();
        assert_eq!(diary.snapshot().entries.len(), 1);

        backend.sign_out().await.unwrap();
        let event = diary.next_change().await.unwrap().unwrap();
        assert_eq!(event.kind, crate::backend::AuthEventKind::SignedOut);
        assert!(diary.snapshot().entries.is_empty());
        assert!(diary.identity().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_helper_loads_entries() {
        let backend = MemoryBackend::new();
        backend.register("ana@example.com", "secret1").unwrap();
        let diary = Diary::new(backend.clone(), DiaryConfig::default());
        diary.start().await.unwrap();

        let identity = diary.sign_in("ana@example.com", "secret1").await.unwrap();
        assert_eq!(diary.entries().owner(), Some(identity));
        // The queued SignedIn carries the same identity.
        assert!(!diary.process_pending().await.unwrap());

        diary.sign_out().await.unwrap();
        assert!(diary.entries().owner().is_none());
        diary.shutdown().await;
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_sign_out_keeps_everything() {
        let backend = MemoryBackend::new();
        backend.register("ana@example.com", "secret1").unwrap();
        let diary = Diary::new(backend.clone(), DiaryConfig::default());
        diary.start().await.unwrap();
        let identity = diary.sign_in("ana@example.com", "secret1").await.unwrap();
        diary
            .entries()
            .create(EntryDraft::new("Paris", "trip", Category::Travel))
            .await
            .unwrap();

        backend.fail(Operation::SignOut, "network down");
        let err = diary.sign_out().await.unwrap_err();
        assert_eq!(err.message(), "network down");
        assert!(!diary.process_pending().await.unwrap());
        assert_eq!(diary.identity(), Some(identity));
        assert_eq!(diary.snapshot().entries.len(), 1);
        assert!(backend.get_session().await.unwrap().is_some());
    }
}
