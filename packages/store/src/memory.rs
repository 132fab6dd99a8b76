use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::backend::{
    AuthApi, AuthEventKind, AuthEvents, AuthSubscription, Filter, Order, Row, RpcApi,
    SignUpOutcome, StorageApi, TableApi,
};
use crate::error::{DiaryError, Result};
use crate::models::Identity;
use crate::password::{hash_password, verify_password};

/// Procedure name the in-memory backend understands for identity deletion.
pub const DELETE_USER_RPC: &str = "delete_user";

/// A backend call, as recorded in the journal and targeted by failure injection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    GetSession,
    SignIn,
    SignUp,
    SignOut,
    UpdatePassword,
    ResetPassword,
    Query(String),
    Insert(String),
    Upsert(String),
    Update(String),
    Delete(String),
    UploadObject(String),
    DeleteObject(String),
    Rpc(String),
}

impl Operation {
    /// Whether the call changes remote data (rows, objects or identities).
    pub fn is_data_mutation(&self) -> bool {
        matches!(
            self,
            Operation::Insert(_)
                | Operation::Upsert(_)
                | Operation::Update(_)
                | Operation::Delete(_)
                | Operation::UploadObject(_)
                | Operation::DeleteObject(_)
                | Operation::Rpc(_)
        )
    }
}

#[derive(Debug)]
struct UserRecord {
    identity: Identity,
    password_hash: String,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    session: Option<Identity>,
    /// Identity of the most recent credentialed sign-in; survives sign-out so
    /// privileged procedures still know whom they act for.
    last_authenticated: Option<String>,
    tables: HashMap<String, Vec<Row>>,
    objects: HashMap<(String, String), Vec<u8>>,
    reset_requests: Vec<(String, String)>,
    failures: HashMap<Operation, String>,
    journal: Vec<Operation>,
}

/// In-memory backend for testing and local runs.
///
/// Rows, objects and credentials live behind one mutex. Every call is appended
/// to a journal, and any [`Operation`] can be made to fail with [`fail`](Self::fail).
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
    events: AuthEvents,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and return the injected failure, if any.
    fn enter(&self, op: Operation) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.inner();
        inner.journal.push(op.clone());
        if let Some(message) = inner.failures.get(&op) {
            let message = message.clone();
            return Err(match op {
                Operation::SignIn | Operation::GetSession => DiaryError::auth(message),
                _ => DiaryError::remote(message),
            });
        }
        Ok(inner)
    }

    /// Make every subsequent `op` fail with `message`.
    pub fn fail(&self, op: Operation, message: &str) {
        self.inner().failures.insert(op, message.to_string());
    }

    /// Undo [`fail`](Self::fail).
    pub fn heal(&self, op: &Operation) {
        self.inner().failures.remove(op);
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<Operation> {
        self.inner().journal.clone()
    }

    pub fn clear_calls(&self) {
        self.inner().journal.clear();
    }

    /// Create an account without signing it in.
    pub fn register(&self, email: &str, password: &str) -> Result<Identity> {
        let password_hash = hash_password(password).map_err(DiaryError::Remote)?;
        let identity = Identity::new(uuid::Uuid::new_v4().to_string(), email);
        self.inner().users.insert(
            email.to_lowercase(),
            UserRecord {
                identity: identity.clone(),
                password_hash,
            },
        );
        Ok(identity)
    }

    pub fn user_exists(&self, id: &str) -> bool {
        self.inner().users.values().any(|u| u.identity.id == id)
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner().tables.get(table).cloned().unwrap_or_default()
    }

    /// Seed a row directly, bypassing the journal.
    pub fn seed_row(&self, table: &str, row: Row) {
        self.inner()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Seed an object directly, bypassing the journal.
    pub fn seed_object(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> String {
        self.inner()
            .objects
            .insert((bucket.to_string(), path.to_string()), bytes);
        public_url(bucket, path)
    }

    pub fn object_exists(&self, bucket: &str, path: &str) -> bool {
        self.inner()
            .objects
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    /// Password-reset emails that would have been sent: `(email, redirect)`.
    pub fn reset_requests(&self) -> Vec<(String, String)> {
        self.inner().reset_requests.clone()
    }

    /// Simulate following a recovery link: a session exists but the app must
    /// force a password reset.
    pub fn start_recovery(&self, email: &str) -> Result<Identity> {
        let identity = {
            let mut inner = self.inner();
            let identity = inner
                .users
                .get(&email.to_lowercase())
                .map(|u| u.identity.clone())
                .ok_or_else(|| DiaryError::not_found("User not found"))?;
            inner.session = Some(identity.clone());
            inner.last_authenticated = Some(identity.id.clone());
            identity
        };
        self.events
            .emit(AuthEventKind::PasswordRecovery, Some(identity.clone()));
        Ok(identity)
    }

    /// Simulate the backend refreshing the access token.
    pub fn refresh_token(&self) {
        let session = self.inner().session.clone();
        if session.is_some() {
            self.events.emit(AuthEventKind::TokenRefreshed, session);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }
}

fn public_url(bucket: &str, path: &str) -> String {
    format!("memory://storage/{bucket}/{path}")
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

impl AuthApi for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Identity>> {
        Ok(self.enter(Operation::GetSession)?.session.clone())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = {
            let mut inner = self.enter(Operation::SignIn)?;
            let record = inner
                .users
                .get(&email.to_lowercase())
                .ok_or_else(|| DiaryError::auth("Invalid login credentials"))?;
            let valid =
                verify_password(password, &record.password_hash).map_err(DiaryError::Remote)?;
            if !valid {
                return Err(DiaryError::auth("Invalid login credentials"));
            }
            let identity = record.identity.clone();
            inner.session = Some(identity.clone());
            inner.last_authenticated = Some(identity.id.clone());
            identity
        };
        self.events
            .emit(AuthEventKind::SignedIn, Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        {
            let inner = self.enter(Operation::SignUp)?;
            if inner.users.contains_key(&email.to_lowercase()) {
                return Err(DiaryError::auth("User already registered"));
            }
        }
        let identity = self.register(email, password)?;
        {
            let mut inner = self.inner();
            inner.session = Some(identity.clone());
            inner.last_authenticated = Some(identity.id.clone());
        }
        self.events
            .emit(AuthEventKind::SignedIn, Some(identity.clone()));
        Ok(SignUpOutcome {
            identity: Some(identity),
            confirmation_required: false,
        })
    }

    async fn sign_out(&self) -> Result<()> {
        self.enter(Operation::SignOut)?.session = None;
        self.events.emit(AuthEventKind::SignedOut, None);
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<()> {
        let identity = {
            let mut inner = self.enter(Operation::UpdatePassword)?;
            let identity = inner
                .session
                .clone()
                .ok_or_else(|| DiaryError::auth("Auth session missing!"))?;
            let password_hash = hash_password(new_password).map_err(DiaryError::Remote)?;
            if let Some(record) = inner.users.get_mut(&identity.email.to_lowercase()) {
                record.password_hash = password_hash;
            }
            identity
        };
        self.events
            .emit(AuthEventKind::UserUpdated, Some(identity));
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<()> {
        self.enter(Operation::ResetPassword)?
            .reset_requests
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }
}

impl TableApi for MemoryBackend {
    async fn query(&self, table: &str, filter: &Filter, order: Option<&Order>) -> Result<Vec<Row>> {
        let inner = self.enter(Operation::Query(table.to_string()))?;
        let mut rows: Vec<Row> = inner
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row> {
        let mut inner = self.enter(Operation::Insert(table.to_string()))?;
        if !row.contains_key("id") {
            row.insert("id".into(), uuid::Uuid::new_v4().to_string().into());
        }
        let rows = inner.tables.entry(table.to_string()).or_default();
        if rows.iter().any(|r| r.get("id") == row.get("id")) {
            return Err(DiaryError::remote("duplicate key value violates unique constraint"));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn upsert(&self, table: &str, row: Row) -> Result<Row> {
        let mut inner = self.enter(Operation::Upsert(table.to_string()))?;
        let rows = inner.tables.entry(table.to_string()).or_default();
        match rows
            .iter_mut()
            .find(|r| row.contains_key("id") && r.get("id") == row.get("id"))
        {
            Some(existing) => {
                existing.extend(row);
                Ok(existing.clone())
            }
            None => {
                let mut row = row;
                if !row.contains_key("id") {
                    row.insert("id".into(), uuid::Uuid::new_v4().to_string().into());
                }
                rows.push(row.clone());
                Ok(row)
            }
        }
    }

    async fn update(&self, table: &str, filter: &Filter, changes: Row) -> Result<Vec<Row>> {
        let mut inner = self.enter(Operation::Update(table.to_string()))?;
        let mut affected = Vec::new();
        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                row.extend(changes.clone());
                affected.push(row.clone());
            }
        }
        Ok(affected)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        let mut inner = self.enter(Operation::Delete(table.to_string()))?;
        let Some(rows) = inner.tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<Row>, Vec<Row>) =
            rows.drain(..).partition(|r| filter.matches(r));
        *rows = kept;
        Ok(removed)
    }
}

impl StorageApi for MemoryBackend {
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String> {
        let mut inner = self.enter(Operation::UploadObject(bucket.to_string()))?;
        let key = (bucket.to_string(), path.to_string());
        if inner.objects.contains_key(&key) {
            return Err(DiaryError::remote("The resource already exists"));
        }
        inner.objects.insert(key, bytes);
        Ok(public_url(bucket, path))
    }

    async fn delete_object(&self, bucket: &str, path: &str) -> Result<()> {
        self.enter(Operation::DeleteObject(bucket.to_string()))?
            .objects
            .remove(&(bucket.to_string(), path.to_string()));
        Ok(())
    }
}

impl RpcApi for MemoryBackend {
    async fn invoke_privileged(&self, name: &str) -> Result<()> {
        let mut inner = self.enter(Operation::Rpc(name.to_string()))?;
        if name != DELETE_USER_RPC {
            return Err(DiaryError::not_found(format!("Unknown procedure: {name}")));
        }
        let user_id = inner
            .last_authenticated
            .take()
            .ok_or_else(|| DiaryError::auth("Not authenticated"))?;
        inner.users.retain(|_, u| u.identity.id != user_id);
        if inner
            .session
            .as_ref()
            .is_some_and(|identity| identity.id == user_id)
        {
            inner.session = None;
        }
        Ok(())
    }
}

/// Helper for building rows in tests and seeds.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// RFC 3339 timestamp as a JSON value.
pub fn timestamp(at: DateTime<Utc>) -> Value {
    at.to_rfc3339().into()
}
