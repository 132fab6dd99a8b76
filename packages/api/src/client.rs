//! # `SupabaseClient`: the hosted backend over HTTP
//!
//! Implements every capability trait from `store::backend` against the project's
//! REST surface:
//!
//! | Trait | Endpoints |
//! |-------|-----------|
//! | `AuthApi` | `/auth/v1/token`, `/auth/v1/signup`, `/auth/v1/logout`, `/auth/v1/user`, `/auth/v1/recover` |
//! | `TableApi` | `/rest/v1/<table>` |
//! | `StorageApi` | `/storage/v1/object/<bucket>/<path>` |
//! | `RpcApi` | `/rest/v1/rpc/<name>` |
//!
//! Every request carries the `apikey` header. The bearer token is the session's
//! access token when signed in. After sign-out, data, storage and privileged
//! calls keep using the access token of the most recent credentialed sign-in;
//! only a client that never signed in falls back to the anonymous key. Account
//! deletion signs out before purging rows and relies on that token still being
//! accepted by the backend.
//!
//! Sign-out only drops the local session once the backend has accepted it (or
//! rejected the token as already invalid). A network failure keeps the session.
//! Auth-state changes made through this client are broadcast on its
//! [`AuthEvents`] channel.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use store::{
    AuthApi, AuthEventKind, AuthEvents, AuthSubscription, DiaryError, Filter, Identity, Order,
    Result, Row, RpcApi, SignUpOutcome, StorageApi, TableApi,
};

use crate::auth::{parse_fragment, ConfigError, SessionTokens, SupabaseConfig};
use crate::db::{order_param, query_params, PREFER_MERGE, PREFER_REPRESENTATION};
use crate::error::{status_error, transport_error, Surface};
use crate::models::SupabaseUser;

#[derive(Clone)]
pub struct SupabaseClient {
    config: Arc<SupabaseConfig>,
    http: reqwest::Client,
    session: Arc<RwLock<Option<SessionTokens>>>,
    last_access_token: Arc<RwLock<Option<String>>>,
    events: AuthEvents,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            session: Arc::new(RwLock::new(None)),
            last_access_token: Arc::new(RwLock::new(None)),
            events: AuthEvents::new(),
        }
    }

    /// Client configured from [`SupabaseConfig::load`].
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(SupabaseConfig::load()?))
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Current tokens, for persisting across page loads.
    pub fn session_tokens(&self) -> Option<SessionTokens> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adopt previously persisted tokens without a round trip.
    ///
    /// The next [`get_session`](AuthApi::get_session) validates them.
    pub fn restore_session(&self, tokens: SessionTokens) {
        self.store_session(tokens);
    }

    fn store_session(&self, tokens: SessionTokens) {
        *self
            .last_access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(tokens.access_token.clone());
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
    }

    fn clear_session(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn last_access_token(&self) -> Option<String> {
        self.last_access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bearer for data and storage calls.
    ///
    /// Falls back to the last sign-in's token so the cleanup that follows the
    /// re-authentication in account deletion still passes row-level security.
    fn bearer(&self) -> String {
        self.session_tokens()
            .map(|t| t.access_token)
            .or_else(|| self.last_access_token())
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    fn request(&self, method: Method, path: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, self.config.endpoint(path))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, surface: Surface, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %body, "backend request failed");
        Err(status_error(surface, status.as_u16(), &body))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| DiaryError::remote(format!("Malformed response: {e}")))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<SupabaseUser> {
        let response = self
            .send(
                Surface::Auth,
                self.request(Method::GET, "auth/v1/user", access_token),
            )
            .await?;
        Self::decode(response).await
    }

    /// Store a token grant, filling in the user when the grant omitted it.
    async fn adopt(&self, mut tokens: SessionTokens) -> Result<Identity> {
        let user = match tokens.user.take() {
            Some(user) => user,
            None => self.fetch_user(&tokens.access_token).await?,
        };
        let identity = user.to_identity();
        tokens.user = Some(user);
        self.store_session(tokens);
        Ok(identity)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<SessionTokens> {
        let request = self
            .request(Method::POST, "auth/v1/token", &self.config.anon_key)
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let response = self.send(Surface::Auth, request).await?;
        Self::decode(response).await
    }

    /// Establish a session from an auth redirect's URL fragment.
    ///
    /// A recovery link emits `PasswordRecovery`, any other link `SignedIn`.
    /// `Ok(None)` when the fragment carries no tokens.
    pub async fn set_session_from_fragment(&self, fragment: &str) -> Result<Option<Identity>> {
        let Some(link) = parse_fragment(fragment)? else {
            return Ok(None);
        };
        let identity = self
            .adopt(SessionTokens {
                access_token: link.access_token.clone(),
                refresh_token: link.refresh_token.clone(),
                expires_in: link.expires_in,
                user: None,
            })
            .await?;
        let kind = if link.is_recovery() {
            AuthEventKind::PasswordRecovery
        } else {
            AuthEventKind::SignedIn
        };
        tracing::info!(?kind, "session from link");
        self.events.emit(kind, Some(identity.clone()));
        Ok(Some(identity))
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh_session(&self) -> Result<Identity> {
        let refresh_token = self
            .session_tokens()
            .map(|t| t.refresh_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DiaryError::auth("Auth session missing!"))?;
        let tokens = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        let identity = self.adopt(tokens).await?;
        self.events
            .emit(AuthEventKind::TokenRefreshed, Some(identity.clone()));
        Ok(identity)
    }

    /// Whether the backend answers a one-row select on `table`.
    pub async fn ping(&self, table: &str) -> bool {
        let request = self
            .request(Method::GET, &format!("rest/v1/{table}"), &self.bearer())
            .query(&[("select", "id"), ("limit", "1")]);
        match self.send(Surface::Data, request).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("ping failed: {}", e);
                false
            }
        }
    }

    async fn rows(&self, request: RequestBuilder) -> Result<Vec<Row>> {
        let response = self.send(Surface::Data, request).await?;
        Self::decode(response).await
    }

    fn table_request(&self, method: Method, table: &str, filter: &Filter) -> RequestBuilder {
        self.request(method, &format!("rest/v1/{table}"), &self.bearer())
            .query(&query_params(filter))
    }
}

impl AuthApi for SupabaseClient {
    async fn get_session(&self) -> Result<Option<Identity>> {
        let Some(tokens) = self.session_tokens() else {
            return Ok(None);
        };
        match self.fetch_user(&tokens.access_token).await {
            Ok(user) => Ok(Some(user.to_identity())),
            Err(DiaryError::Auth(_)) if !tokens.refresh_token.is_empty() => {
                tracing::debug!("access token rejected, refreshing");
                self.refresh_session().await.map(Some)
            }
            Err(e) => Err(e),
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let tokens = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        let identity = self.adopt(tokens).await?;
        self.events
            .emit(AuthEventKind::SignedIn, Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let request = self
            .request(Method::POST, "auth/v1/signup", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password }));
        let body: Value = Self::decode(self.send(Surface::Auth, request).await?).await?;

        if body.get("access_token").is_some() {
            let tokens: SessionTokens = serde_json::from_value(body)
                .map_err(|e| DiaryError::remote(format!("Malformed response: {e}")))?;
            let identity = self.adopt(tokens).await?;
            self.events
                .emit(AuthEventKind::SignedIn, Some(identity.clone()));
            return Ok(SignUpOutcome {
                identity: Some(identity),
                confirmation_required: false,
            });
        }

        let user: SupabaseUser = serde_json::from_value(body.get("user").cloned().unwrap_or(body))
            .map_err(|e| DiaryError::remote(format!("Malformed response: {e}")))?;
        Ok(SignUpOutcome {
            identity: Some(user.to_identity()),
            confirmation_required: true,
        })
    }

    async fn sign_out(&self) -> Result<()> {
        let result = match self.session_tokens() {
            Some(tokens) => self
                .send(
                    Surface::Auth,
                    self.request(Method::POST, "auth/v1/logout", &tokens.access_token),
                )
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        match result {
            Ok(()) => {}
            // An expired token is as signed out as it gets.
            Err(DiaryError::Auth(message)) => tracing::debug!("logout rejected: {}", message),
            Err(e) => return Err(e),
        }
        self.clear_session();
        self.events.emit(AuthEventKind::SignedOut, None);
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<()> {
        let mut tokens = self
            .session_tokens()
            .ok_or_else(|| DiaryError::auth("Auth session missing!"))?;
        let request = self
            .request(Method::PUT, "auth/v1/user", &tokens.access_token)
            .json(&json!({ "password": new_password }));
        let user: SupabaseUser = Self::decode(self.send(Surface::Auth, request).await?).await?;
        let identity = user.to_identity();
        tokens.user = Some(user);
        self.store_session(tokens);
        self.events
            .emit(AuthEventKind::UserUpdated, Some(identity));
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<()> {
        let request = self
            .request(Method::POST, "auth/v1/recover", &self.config.anon_key)
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));
        self.send(Surface::Auth, request).await?;
        Ok(())
    }
}

impl TableApi for SupabaseClient {
    async fn query(&self, table: &str, filter: &Filter, order: Option<&Order>) -> Result<Vec<Row>> {
        let mut request = self
            .table_request(Method::GET, table, filter)
            .query(&[("select", "*")]);
        if let Some(order) = order {
            request = request.query(&[order_param(order)]);
        }
        self.rows(request).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        let request = self
            .table_request(Method::POST, table, &Filter::new())
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&row);
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DiaryError::remote("Insert returned no row"))
    }

    async fn upsert(&self, table: &str, row: Row) -> Result<Row> {
        let request = self
            .table_request(Method::POST, table, &Filter::new())
            .header("Prefer", PREFER_MERGE)
            .json(&row);
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DiaryError::remote("Upsert returned no row"))
    }

    async fn update(&self, table: &str, filter: &Filter, changes: Row) -> Result<Vec<Row>> {
        let request = self
            .table_request(Method::PATCH, table, filter)
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&changes);
        self.rows(request).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        let request = self
            .table_request(Method::DELETE, table, filter)
            .header("Prefer", PREFER_REPRESENTATION);
        self.rows(request).await
    }
}

impl StorageApi for SupabaseClient {
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let request = self
            .request(
                Method::POST,
                &format!("storage/v1/object/{bucket}/{path}"),
                &self.bearer(),
            )
            .header("Content-Type", content_type)
            .body(bytes);
        self.send(Surface::Data, request).await?;
        Ok(self.config.public_object_url(bucket, path))
    }

    async fn delete_object(&self, bucket: &str, path: &str) -> Result<()> {
        let request = self.request(
            Method::DELETE,
            &format!("storage/v1/object/{bucket}/{path}"),
            &self.bearer(),
        );
        self.send(Surface::Data, request).await?;
        Ok(())
    }
}

impl RpcApi for SupabaseClient {
    async fn invoke_privileged(&self, name: &str) -> Result<()> {
        let token = self
            .session_tokens()
            .map(|t| t.access_token)
            .or_else(|| self.last_access_token())
            .ok_or_else(|| DiaryError::auth("Not authenticated"))?;
        let request = self
            .request(Method::POST, &format!("rest/v1/rpc/{name}"), &token)
            .json(&json!({}));
        self.send(Surface::Data, request).await?;
        tracing::info!(name, "privileged procedure completed");
        Ok(())
    }
}
