//! # Account Lifecycle Coordinator
//!
//! Permanent account deletion, gated on re-entering the password.
//!
//! ```text
//! Idle ─begin─▶ Confirming ─confirm─▶ Verifying ─▶ Purging ─▶ Finalizing ─▶ Done
//!   ▲              │                     │                        │
//!   └────cancel────┘                     └────────▶ Failed ◀──────┘
//! ```
//!
//! | Step | Phase | On failure |
//! |------|-------|-----------|
//! | 1. credentialed sign-in with the supplied password | Verifying | abort, nothing touched |
//! | 2. sign out | Verifying | abort |
//! | 3. delete the avatar object | Purging | warn, continue |
//! | 4. delete the identity's entry rows | Purging | warn, continue |
//! | 5. delete the profile row | Purging | warn, continue |
//! | 6. privileged identity deletion | Finalizing | abort |
//! | 7. clear local identity, profile and entries | Done | |
//!
//! Cleanup warnings are logged and also returned in the [`DeletionReport`].
//! The Session Store is muted for the whole run, so the step-2 sign-out never
//! clears the cached identity: a failed deletion leaves the user shown as the
//! same account.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::backend::{Backend, Filter};
use crate::config::DiaryConfig;
use crate::entries::EntryStore;
use crate::error::{DiaryError, Result};
use crate::profile::ProfileStore;
use crate::session::SessionStore;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeletionPhase {
    #[default]
    Idle,
    /// Password prompt open.
    Confirming,
    Verifying,
    Purging,
    Finalizing,
    Done,
    Failed,
}

impl DeletionPhase {
    /// A deletion is running and the UI should not accept input.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            DeletionPhase::Verifying | DeletionPhase::Purging | DeletionPhase::Finalizing
        )
    }
}

/// A best-effort cleanup step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanupStep {
    AvatarObject,
    EntryRows,
    ProfileRow,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CleanupStep::AvatarObject => "avatar image",
            CleanupStep::EntryRows => "diary entries",
            CleanupStep::ProfileRow => "profile",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CleanupWarning {
    pub step: CleanupStep,
    pub message: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not remove {}: {}", self.step, self.message)
    }
}

/// Outcome of a completed deletion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeletionReport {
    pub warnings: Vec<CleanupWarning>,
}

impl DeletionReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, step: CleanupStep, err: DiaryError) {
        tracing::warn!("Failed to remove {}: {}", step, err);
        self.warnings.push(CleanupWarning {
            step,
            message: err.message().to_string(),
        });
    }
}

#[derive(Clone)]
pub struct AccountLifecycle<B: Backend> {
    backend: B,
    delete_user_rpc: String,
    entries_table: String,
    profiles_table: String,
    avatar_bucket: String,
    session: SessionStore<B>,
    entries: EntryStore<B>,
    profile: ProfileStore<B>,
    phase: Arc<RwLock<DeletionPhase>>,
}

impl<B: Backend> AccountLifecycle<B> {
    pub fn new(
        backend: B,
        config: &DiaryConfig,
        session: SessionStore<B>,
        entries: EntryStore<B>,
        profile: ProfileStore<B>,
    ) -> Self {
        Self {
            backend,
            delete_user_rpc: config.auth.delete_user_rpc.clone(),
            entries_table: config.tables.entries.clone(),
            profiles_table: config.tables.profiles.clone(),
            avatar_bucket: config.storage.avatars.clone(),
            session,
            entries,
            profile,
            phase: Arc::new(RwLock::new(DeletionPhase::Idle)),
        }
    }

    pub fn phase(&self) -> DeletionPhase {
        *self.phase.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: DeletionPhase) {
        tracing::debug!(?phase, "account deletion");
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn fail(&self, err: DiaryError) -> DiaryError {
        tracing::error!("Account deletion failed: {}", err);
        self.set_phase(DeletionPhase::Failed);
        err
    }

    /// Open the confirmation prompt.
    pub fn begin(&self) -> Result<()> {
        match self.phase() {
            DeletionPhase::Idle | DeletionPhase::Done | DeletionPhase::Failed => {
                self.set_phase(DeletionPhase::Confirming);
                Ok(())
            }
            DeletionPhase::Confirming => Ok(()),
            _ => Err(DiaryError::InProgress(
                "Account deletion is already running".into(),
            )),
        }
    }

    /// Close the prompt without deleting anything.
    pub fn cancel(&self) {
        if self.phase() == DeletionPhase::Confirming {
            self.set_phase(DeletionPhase::Idle);
        }
    }

    /// Run the deletion sequence for the signed-in identity.
    pub async fn confirm(&self, password: &str) -> Result<DeletionReport> {
        match self.phase() {
            DeletionPhase::Confirming => {}
            phase if phase.is_busy() => {
                return Err(DiaryError::InProgress(
                    "Account deletion is already running".into(),
                ))
            }
            _ => {
                return Err(DiaryError::validation(
                    "Confirm account deletion before entering your password",
                ))
            }
        }
        if password.is_empty() {
            return Err(DiaryError::validation("Password is required"));
        }
        let identity = self
            .session
            .identity()
            .ok_or_else(|| DiaryError::auth("You must be signed in"))?;

        self.set_phase(DeletionPhase::Verifying);
        let mute = self.session.mute();

        if let Err(e) = self
            .backend
            .sign_in_with_password(&identity.email, password)
            .await
        {
            let e = match e {
                DiaryError::Auth(_) => DiaryError::auth("Incorrect password"),
                other => other,
            };
            return Err(self.fail(e));
        }
        if let Err(e) = self.backend.sign_out().await {
            return Err(self.fail(e));
        }

        self.set_phase(DeletionPhase::Purging);
        let mut report = DeletionReport::default();

        // The cache may never have been loaded; the remote row is authoritative.
        let avatar = match self.profile.stored_avatar_path(&identity).await {
            Ok(path) => path,
            Err(e) => {
                report.warn(CleanupStep::AvatarObject, e);
                self.profile.avatar_path(&identity)
            }
        };
        if let Some(path) = avatar {
            if let Err(e) = self.backend.delete_object(&self.avatar_bucket, &path).await {
                report.warn(CleanupStep::AvatarObject, e);
            }
        }
        if let Err(e) = self
            .backend
            .delete(
                &self.entries_table,
                &Filter::new().eq("user_id", identity.id.as_str()),
            )
            .await
        {
            report.warn(CleanupStep::EntryRows, e);
        }
        if let Err(e) = self
            .backend
            .delete(
                &self.profiles_table,
                &Filter::new().eq("id", identity.id.as_str()),
            )
            .await
        {
            report.warn(CleanupStep::ProfileRow, e);
        }

        self.set_phase(DeletionPhase::Finalizing);
        if let Err(e) = self.backend.invoke_privileged(&self.delete_user_rpc).await {
            return Err(self.fail(e));
        }

        drop(mute);
        self.session.clear();
        self.entries.clear();
        self.profile.clear();
        self.set_phase(DeletionPhase::Done);
        tracing::info!(id = %identity.id, warnings = report.warnings.len(), "account deleted");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthApi, TableApi};
    use crate::memory::{row, MemoryBackend, Operation};
    use crate::models::{Category, EntryDraft, Identity};

    struct Fixture {
        backend: MemoryBackend,
        session: SessionStore<MemoryBackend>,
        entries: EntryStore<MemoryBackend>,
        profile: ProfileStore<MemoryBackend>,
        account: AccountLifecycle<MemoryBackend>,
        identity: Identity,
    }

    /// Signed-in user with one entry and an avatar.
    async fn fixture() -> Fixture {
        let backend = MemoryBackend::new();
        let config = DiaryConfig::default();
        backend.register("ana@example.com", "secret1").unwrap();

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

        session.init().await;
        let identity = session.sign_in("ana@example.com", "secret1").await.unwrap();
        session.process_pending();
        entries.set_identity(Some(identity.clone())).await.unwrap();
        entries
            .create(EntryDraft::new("Paris", "trip", Category::Travel))
            .await
            .unwrap();
        profile.load(&identity).await.unwrap();
        profile
            .upload_avatar(&identity, "me.png", vec![1, 2])
            .await
            .unwrap();
        backend.clear_calls();

        Fixture {
            backend,
            session,
            entries,
            profile,
            account,
            identity,
        }
    }

    #[tokio::test]
    async fn test_confirm_requires_prompt() {
        let f = fixture().await;
        let err = f.account.confirm("secret1").await.unwrap_err();
        assert!(matches!(err, DiaryError::Validation(_)));

        f.account.begin().unwrap();
        f.account.cancel();
        assert_eq!(f.account.phase(), DeletionPhase::Idle);
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_password_touches_nothing() {
        let f = fixture().await;
        f.account.begin().unwrap();

        let err = f.account.confirm("nope").await.unwrap_err();
        assert_eq!(err, DiaryError::auth("Incorrect password"));
        assert_eq!(f.account.phase(), DeletionPhase::Failed);
        assert!(f.backend.calls().iter().all(|c| !c.is_data_mutation()));
        assert!(f.backend.user_exists(&f.identity.id));
        assert_eq!(f.backend.rows("diary_entries").len(), 1);
        assert_eq!(f.backend.rows("profiles").len(), 1);
        assert_eq!(f.session.identity(), Some(f.identity.clone()));
    }

    #[tokio::test]
    async fn test_full_deletion() {
        let f = fixture().await;
        f.account.begin().unwrap();

        let report = f.account.confirm("secret1").await.unwrap();
        assert!(report.is_clean());
        assert_eq!(f.account.phase(), DeletionPhase::Done);
        assert!(!f.backend.user_exists(&f.identity.id));
        assert!(f.backend.rows("diary_entries").is_empty());
        assert!(f.backend.rows("profiles").is_empty());
        assert!(f.session.identity().is_none());
        assert!(f.entries.list().is_empty());
        assert!(f.profile.current().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_failures_do_not_stop_identity_deletion() {
        let f = fixture().await;
        f.backend
            .fail(Operation::DeleteObject("avatars".into()), "storage down");
        f.backend
            .fail(Operation::Delete("diary_entries".into()), "rls denied");
        f.account.begin().unwrap();

        let report = f.account.confirm("secret1").await.unwrap();
        assert_eq!(f.account.phase(), DeletionPhase::Done);
        let steps: Vec<_> = report.warnings.iter().map(|w| w.step).collect();
        assert_eq!(steps, vec![CleanupStep::AvatarObject, CleanupStep::EntryRows]);
        assert_eq!(report.warnings[1].message, "rls denied");
        assert!(f
            .backend
            .calls()
            .contains(&Operation::Rpc("delete_user".into())));
        assert!(!f.backend.user_exists(&f.identity.id));
        assert!(f.session.identity().is_none());
    }

    #[tokio::test]
    async fn test_profile_row_failure_is_a_warning() {
        let f = fixture().await;
        f.backend
            .fail(Operation::Delete("profiles".into()), "rls denied");
        f.account.begin().unwrap();

        let report = f.account.confirm("secret1").await.unwrap();
        assert_eq!(f.account.phase(), DeletionPhase::Done);
        assert_eq!(
            report.warnings,
            vec![CleanupWarning {
                step: CleanupStep::ProfileRow,
                message: "rls denied".into(),
            }]
        );
        assert!(!f.backend.user_exists(&f.identity.id));
        assert!(f.backend.rows("diary_entries").is_empty());
        assert_eq!(f.backend.rows("profiles").len(), 1);
    }

    #[tokio::test]
    async fn test_avatar_removed_without_loaded_profile() {
        let backend = MemoryBackend::new();
        let config = DiaryConfig::default();
        let identity = backend.register("bo@example.com", "secret1").unwrap();
        let path = format!("{}/avatar-1.png", identity.id);
        let url = backend.seed_object("avatars", &path, vec![7]);
        backend.seed_row(
            "profiles",
            row(&[
                ("id", identity.id.clone().into()),
                ("username", "bo".into()),
                ("avatar_url", url.into()),
            ]),
        );

        let session = SessionStore::new(backend.clone(), config.auth.clone());
        let entries = EntryStore::new(backend.clone(), &config);
        let profile = ProfileStore::new(backend.clone(), &config);
        let account = AccountLifecycle::new(
            backend.clone(),
            &config,
            session.clone(),
            entries,
            profile.clone(),
        );
        session.init().await;
        session.sign_in("bo@example.com", "secret1").await.unwrap();
        session.process_pending();
        assert!(profile.current().is_none());

        account.begin().unwrap();
        let report = account.confirm("secret1").await.unwrap();
        assert!(report.is_clean());
        assert!(!backend.object_exists("avatars", &path));
        assert!(backend.rows("profiles").is_empty());
    }

    #[tokio::test]
    async fn test_identity_deletion_failure_keeps_identity() {
        let f = fixture().await;
        f.backend
            .fail(Operation::Rpc("delete_user".into()), "permission denied");
        f.account.begin().unwrap();

        let err = f.account.confirm("secret1").await.unwrap_err();
        assert_eq!(err, DiaryError::remote("permission denied"));
        assert_eq!(f.account.phase(), DeletionPhase::Failed);
        assert_eq!(f.session.identity(), Some(f.identity.clone()));
        assert!(!f.session.process_pending());
        assert!(f.backend.user_exists(&f.identity.id));
        assert!(f.backend.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_begin_again_after_failure() {
        let f = fixture().await;
        f.account.begin().unwrap();
        let _ = f.account.confirm("wrong").await;
        assert_eq!(f.account.phase(), DeletionPhase::Failed);
        f.account.begin().unwrap();
        assert_eq!(f.account.phase(), DeletionPhase::Confirming);

        let rows = f
            .backend
            .query("diary_entries", &Filter::new(), None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
