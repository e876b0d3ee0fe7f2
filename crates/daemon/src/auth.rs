//! Platform authentication: two-legged credentials behind a per-scope cache,
//! and the three-legged user session flow.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use collab_core::api::UserProfile;
use collab_core::model::{Credential, ScopeSet, SessionTokens};
use collab_core::{now_ms, BridgeError};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::aps;
use crate::config::Config;

/// Issues fresh two-legged credentials.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self, scopes: &ScopeSet) -> Result<Credential, BridgeError>;
}

/// One cached credential per scope set.
///
/// A fetch happens only when the slot is empty or `now >= expires_at`. The
/// lock is not held across the fetch, so callers racing on an expired slot
/// may each fetch; the last one to finish wins the slot.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    entries: RwLock<HashMap<ScopeSet, Credential>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_token(&self, scopes: &ScopeSet) -> Result<Credential, BridgeError> {
        if let Some(c) = self.entries.read().await.get(scopes) {
            if !c.is_expired_at(now_ms()) {
                return Ok(c.clone());
            }
        }

        let fresh = self.source.fetch(scopes).await?;
        debug!(scopes = %scopes, expires_at_ms = fresh.expires_at_ms, "fetched credential");
        self.entries
            .write()
            .await
            .insert(scopes.clone(), fresh.clone());
        Ok(fresh)
    }

    pub async fn public(&self) -> Result<Credential, BridgeError> {
        self.get_token(&ScopeSet::public()).await
    }

    pub async fn internal(&self) -> Result<Credential, BridgeError> {
        self.get_token(&ScopeSet::internal()).await
    }

    /// Forces the next request for `scopes` to fetch.
    pub async fn invalidate(&self, scopes: &ScopeSet) {
        self.entries.write().await.remove(scopes);
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// OAuth client of the platform authentication service.
pub struct ApsAuth {
    http: reqwest::Client,
    base_url: String,
    profile_url: String,
    client_id: String,
    client_secret: String,
    callback_url: String,
}

impl ApsAuth {
    pub fn new(http: reqwest::Client, cfg: &Config) -> Self {
        Self {
            http,
            base_url: cfg.aps_base_url.clone(),
            profile_url: cfg.profile_url.clone(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            callback_url: cfg.callback_url.clone(),
        }
    }

    /// Where the browser is sent to log in.
    pub fn authorize_url(&self) -> Result<String, BridgeError> {
        let scope = ScopeSet::session().to_string();
        let url = reqwest::Url::parse_with_params(
            &aps::join(&self.base_url, "/authentication/v2/authorize"),
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("scope", scope.as_str()),
            ],
        )
        .map_err(BridgeError::auth)?;
        Ok(url.to_string())
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, BridgeError> {
        let resp = self
            .http
            .post(aps::join(&self.base_url, "/authentication/v2/token"))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(BridgeError::auth)?;
        aps::json::<TokenResponse>(resp)
            .await
            .map_err(|e| BridgeError::Auth(e.to_string()))
    }

    /// Exchanges an authorization code for a full session.
    pub async fn exchange_code(&self, code: &str) -> Result<SessionTokens, BridgeError> {
        let internal = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.callback_url.as_str()),
            ])
            .await?;
        self.complete_session(internal).await
    }

    /// Refreshes both session tokens.
    pub async fn refresh(&self, tokens: &SessionTokens) -> Result<SessionTokens, BridgeError> {
        let scope = ScopeSet::session().to_string();
        let internal = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", tokens.refresh_token.as_str()),
                ("scope", scope.as_str()),
            ])
            .await?;
        self.complete_session(internal).await
    }

    /// Derives the public token from the internal one's refresh token.
    async fn complete_session(&self, internal: TokenResponse) -> Result<SessionTokens, BridgeError> {
        let expires_in = internal
            .expires_in
            .ok_or_else(|| BridgeError::Auth("token response without expires_in".into()))?;
        let internal_refresh = internal
            .refresh_token
            .ok_or_else(|| BridgeError::Auth("token response without refresh_token".into()))?;

        let scope = ScopeSet::public().to_string();
        let public = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", internal_refresh.as_str()),
                ("scope", scope.as_str()),
            ])
            .await?;
        let refresh_token = public
            .refresh_token
            .ok_or_else(|| BridgeError::Auth("token response without refresh_token".into()))?;

        Ok(SessionTokens {
            internal_token: internal.access_token,
            public_token: public.access_token,
            refresh_token,
            expires_at_ms: now_ms() + expires_in * 1000,
        })
    }

    pub async fn user_profile(&self, tokens: &SessionTokens) -> Result<UserProfile, BridgeError> {
        let resp = self
            .http
            .get(&self.profile_url)
            .bearer_auth(&tokens.internal_token)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        aps::json(resp).await
    }
}

#[async_trait]
impl TokenSource for ApsAuth {
    async fn fetch(&self, scopes: &ScopeSet) -> Result<Credential, BridgeError> {
        let scope = scopes.to_string();
        let resp = self
            .token_request(&[("grant_type", "client_credentials"), ("scope", scope.as_str())])
            .await?;
        let expires_in = resp
            .expires_in
            .ok_or_else(|| BridgeError::Auth("Failed to get tokens.".into()))?;
        Ok(Credential::expiring_in(resp.access_token, now_ms(), expires_in))
    }
}
