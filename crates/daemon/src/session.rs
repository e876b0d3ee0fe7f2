//! Server-side store of three-legged user sessions keyed by a cookie.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue};
use collab_core::model::SessionTokens;
use collab_core::{now_ms, BridgeError};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::ApsAuth;

pub const SESSION_COOKIE: &str = "collab_session";

pub struct SessionStore {
    auth: Arc<ApsAuth>,
    sessions: RwLock<HashMap<String, SessionTokens>>,
}

impl SessionStore {
    pub fn new(auth: Arc<ApsAuth>) -> Self {
        Self {
            auth,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Stores `tokens` under a fresh session id and returns the id.
    pub async fn create(&self, tokens: SessionTokens) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.write().await.insert(id.clone(), tokens);
        id
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// Tokens of the caller's session, refreshed when expired.
    ///
    /// A missing cookie, an unknown session or a failed refresh all yield
    /// `Unauthorized`; a failed refresh also drops the session.
    pub async fn prepare_tokens(&self, headers: &HeaderMap) -> Result<SessionTokens, BridgeError> {
        let id = session_id(headers).ok_or(BridgeError::Unauthorized)?;
        let current = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(BridgeError::Unauthorized)?;

        if !current.is_expired_at(now_ms()) {
            return Ok(current);
        }

        match self.auth.refresh(&current).await {
            Ok(fresh) => {
                info!(session = %id, "session refreshed");
                self.sessions.write().await.insert(id, fresh.clone());
                Ok(fresh)
            }
            Err(e) => {
                warn!(session = %id, error = %e, "session refresh failed");
                self.remove(&id).await;
                Err(BridgeError::Unauthorized)
            }
        }
    }
}

/// Reads the session id from the `Cookie` header(s).
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

pub fn set_cookie(id: &str) -> Result<HeaderValue, BridgeError> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .map_err(BridgeError::transport)
}

pub fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static("collab_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
