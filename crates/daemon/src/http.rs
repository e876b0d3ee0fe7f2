use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use collab_core::api::{
    parse_workitem_data, CallbackQuery, ContentsQuery, PublicTokenResponse, StartWorkitemForm,
    StartWorkitemResponse, UserProfile,
};
use collab_core::now_ms;
use serde_json::Value;

use crate::auth::{ApsAuth, TokenCache};
use crate::config::Config;
use crate::da::{ActivityProvisioner, DesignAutomationClient};
use crate::dm::DataManagementClient;
use crate::error::ApiError;
use crate::hub::{self, NotificationHub};
use crate::monitor::MonitorDeps;
use crate::oss::ObjectStorageClient;
use crate::report::HttpReportFetcher;
use crate::service::WorkItemService;
use crate::session::{self, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WorkItemService>,
    pub sessions: Arc<SessionStore>,
    pub auth: Arc<ApsAuth>,
    pub dm: Arc<DataManagementClient>,
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    /// Wires every client from the configuration. Performs no I/O.
    pub fn new(cfg: &Config) -> Self {
        let http = reqwest::Client::new();

        let auth = Arc::new(ApsAuth::new(http.clone(), cfg));
        let tokens = Arc::new(TokenCache::new(auth.clone()));
        let hub = Arc::new(NotificationHub::new());

        let dm = Arc::new(DataManagementClient::new(http.clone(), cfg.aps_base_url.clone()));
        let storage = Arc::new(ObjectStorageClient::new(
            http.clone(),
            cfg.aps_base_url.clone(),
            tokens.clone(),
        ));
        let da = Arc::new(DesignAutomationClient::new(
            http.clone(),
            cfg.da_base_url.clone(),
            tokens.clone(),
        ));
        let activities = Arc::new(ActivityProvisioner::new(
            da.clone(),
            cfg.da.clone(),
            cfg.client_id.clone(),
            cfg.package_path(),
            hub.clone(),
        ));

        let monitor = MonitorDeps {
            work_items: da.clone(),
            reports: Arc::new(HttpReportFetcher::new(http)),
            versions: dm.clone(),
            notifier: hub.clone(),
            poll_interval: cfg.poll_interval,
        };

        let service = Arc::new(WorkItemService::new(
            storage,
            dm.clone(),
            da,
            activities,
            tokens,
            monitor,
            cfg.bucket_key.clone(),
            cfg.input_drawing_path(),
        ));

        Self {
            service,
            sessions: Arc::new(SessionStore::new(auth.clone())),
            auth,
            dm,
            hub,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/auth/login", get(login))
        .route("/api/auth/callback", get(callback))
        .route("/api/auth/logout", get(logout))
        .route("/api/auth/token", get(public_token))
        .route("/api/auth/profile", get(profile))
        .route("/api/hubs", get(hubs))
        .route("/api/hubs/{hub}/projects", get(projects))
        .route("/api/hubs/{hub}/projects/{project}/contents", get(contents))
        .route(
            "/api/hubs/{hub}/projects/{project}/contents/{item}/versions",
            get(versions),
        )
        .route("/api/da/workitems", post(start_workitem))
        .route("/api/ws/designautomation", get(ws))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// 302 to `location`, optionally setting a cookie.
fn found(location: &str, cookie: Option<HeaderValue>) -> Result<Response, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::LOCATION,
        HeaderValue::from_str(location).map_err(ApiError::internal)?,
    );
    if let Some(c) = cookie {
        headers.insert(header::SET_COOKIE, c);
    }
    Ok((StatusCode::FOUND, headers).into_response())
}

async fn login(State(st): State<AppState>) -> Result<Response, ApiError> {
    found(&st.auth.authorize_url()?, None)
}

async fn callback(
    State(st): State<AppState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let code = q
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing code"))?;
    let tokens = st.auth.exchange_code(&code).await.map_err(|e| {
        tracing::warn!(error = %e, "code exchange failed");
        ApiError::Unauthorized
    })?;
    let id = st.sessions.create(tokens).await;
    tracing::info!(session = %id, "user logged in");
    found("/", Some(session::set_cookie(&id)?))
}

async fn logout(State(st): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(id) = session::session_id(&headers) {
        st.sessions.remove(&id).await;
    }
    found("/", Some(session::clear_cookie()))
}

async fn public_token(
    State(st): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PublicTokenResponse>, ApiError> {
    let tokens = st.sessions.prepare_tokens(&headers).await?;
    let expires_in = tokens.expires_in_secs(now_ms());
    Ok(Json(PublicTokenResponse {
        access_token: tokens.public_token,
        expires_in,
    }))
}

async fn profile(
    State(st): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, ApiError> {
    let tokens = st.sessions.prepare_tokens(&headers).await?;
    Ok(Json(st.auth.user_profile(&tokens).await?))
}

async fn hubs(State(st): State<AppState>, headers: HeaderMap) -> Result<Json<Vec<Value>>, ApiError> {
    let tokens = st.sessions.prepare_tokens(&headers).await?;
    Ok(Json(st.dm.hubs(&tokens.internal_token).await?))
}

async fn projects(
    State(st): State<AppState>,
    Path(hub): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let tokens = st.sessions.prepare_tokens(&headers).await?;
    Ok(Json(st.dm.projects(&tokens.internal_token, &hub).await?))
}

async fn contents(
    State(st): State<AppState>,
    Path((hub, project)): Path<(String, String)>,
    Query(q): Query<ContentsQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let tokens = st.sessions.prepare_tokens(&headers).await?;
    let listing = match q.folder_id.filter(|f| !f.is_empty()) {
        Some(folder) => {
            st.dm
                .folder_listing(&tokens.internal_token, &project, &folder)
                .await?
        }
        None => st.dm.top_folders(&tokens.internal_token, &hub, &project).await?,
    };
    Ok(Json(listing))
}

async fn versions(
    State(st): State<AppState>,
    Path((_hub, project, item)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let tokens = st.sessions.prepare_tokens(&headers).await?;
    Ok(Json(
        st.dm
            .item_versions(&tokens.internal_token, &project, &item)
            .await?,
    ))
}

/// The `data` field of a multipart or urlencoded form.
async fn data_field(req: Request) -> Result<Option<String>, ApiError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(ApiError::bad_request)?;
        while let Some(field) = multipart.next_field().await.map_err(ApiError::bad_request)? {
            if field.name() == Some("data") {
                return Ok(Some(field.text().await.map_err(ApiError::bad_request)?));
            }
        }
        return Ok(None);
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<StartWorkitemForm>::from_request(req, &())
            .await
            .map_err(ApiError::bad_request)?;
        return Ok(form.data);
    }

    Ok(None)
}

async fn start_workitem(
    State(st): State<AppState>,
    req: Request,
) -> Result<Json<StartWorkitemResponse>, ApiError> {
    let headers = req.headers().clone();
    let raw = data_field(req).await?;
    let request = parse_workitem_data(raw.as_deref())?;
    let tokens = st.sessions.prepare_tokens(&headers).await?;
    Ok(Json(st.service.start_workitem(&request, tokens).await?))
}

async fn ws(State(st): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    let hub = st.hub.clone();
    upgrade.on_upgrade(move |socket| hub::serve_socket(socket, hub))
}
