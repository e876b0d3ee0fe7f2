//! Design Automation v3 client and the provisioning of the resources the
//! collaboration job runs on (owner nickname, app bundle, activity).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use collab_core::model::{JobSubmission, Notification, WorkItemStatus};
use collab_core::payload;
use collab_core::settings::{DaSettings, COLLABORATION_NAME};
use collab_core::BridgeError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::aps;
use crate::auth::TokenCache;
use crate::hub::Notifier;

/// Submission and status of work items.
#[async_trait]
pub trait WorkItemApi: Send + Sync {
    async fn create_work_item(&self, submission: &JobSubmission) -> Result<WorkItemStatus, BridgeError>;
    async fn work_item_status(&self, id: &str) -> Result<WorkItemStatus, BridgeError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadParameters {
    #[serde(rename = "endpointURL")]
    endpoint_url: String,
    #[serde(default)]
    form_data: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishedVersion {
    version: i64,
    #[serde(default)]
    upload_parameters: Option<UploadParameters>,
}

/// Thin REST client. Every call carries the internal two-legged credential.
pub struct DesignAutomationClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenCache>,
}

impl DesignAutomationClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: Arc<TokenCache>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    async fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, BridgeError> {
        let token = self.tokens.internal().await?;
        Ok(self
            .http
            .request(method, aps::join(&self.base_url, path))
            .bearer_auth(token.access_token))
    }

    async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, BridgeError> {
        builder.send().await.map_err(BridgeError::transport)
    }

    /// `None` on 404.
    async fn get_optional(&self, path: &str) -> Result<Option<Value>, BridgeError> {
        let resp = Self::send(self.request(reqwest::Method::GET, path).await?).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        aps::json(resp).await.map(Some)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, BridgeError> {
        let resp = Self::send(self.request(reqwest::Method::POST, path).await?.json(body)).await?;
        aps::json(resp).await
    }

    async fn patch_json(&self, path: &str, body: &Value) -> Result<reqwest::Response, BridgeError> {
        Self::send(self.request(reqwest::Method::PATCH, path).await?.json(body)).await
    }

    pub async fn nickname(&self) -> Result<String, BridgeError> {
        let resp = Self::send(self.request(reqwest::Method::GET, "/forgeapps/me").await?).await?;
        aps::json(resp).await
    }

    /// Claims `nickname` for this client. A conflict is a setup failure.
    pub async fn set_nickname(&self, nickname: &str) -> Result<(), BridgeError> {
        let resp = self
            .patch_json("/forgeapps/me", &json!({ "nickname": nickname }))
            .await?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(BridgeError::Setup(format!(
                "nickname {nickname} is in use or this client already owns resources"
            )));
        }
        aps::check(resp).await?;
        Ok(())
    }

    pub async fn app_bundle(&self, alias_id: &str) -> Result<Option<Value>, BridgeError> {
        self.get_optional(&format!("/appbundles/{alias_id}")).await
    }

    pub async fn activity(&self, alias_id: &str) -> Result<Option<Value>, BridgeError> {
        self.get_optional(&format!("/activities/{alias_id}")).await
    }

    /// Creates the first version and points `label` at it.
    async fn create_versioned(&self, kind: &str, body: &Value, label: &str) -> Result<PublishedVersion, BridgeError> {
        let published: PublishedVersion = self.post_json(&format!("/{kind}"), body).await?;
        let name = body.get("id").and_then(|v| v.as_str()).unwrap_or_default();
        let _: Value = self
            .post_json(
                &format!("/{kind}/{name}/aliases"),
                &payload::alias_body(label, published.version),
            )
            .await?;
        Ok(published)
    }

    /// Publishes a new version and moves `label` onto it.
    async fn update_versioned(
        &self,
        kind: &str,
        name: &str,
        body: &Value,
        label: &str,
    ) -> Result<PublishedVersion, BridgeError> {
        let mut body = body.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.remove("id");
        }
        let published: PublishedVersion = self.post_json(&format!("/{kind}/{name}/versions"), &body).await?;
        let resp = self
            .patch_json(
                &format!("/{kind}/{name}/aliases/{label}"),
                &json!({ "version": published.version }),
            )
            .await?;
        aps::check(resp).await?;
        Ok(published)
    }

    /// Posts the package to the pre-signed form returned with a bundle version.
    async fn upload_package(&self, params: &UploadParameters, file_name: &str, bytes: Vec<u8>) -> Result<(), BridgeError> {
        let mut form = reqwest::multipart::Form::new();
        for (k, v) in &params.form_data {
            form = form.text(k.clone(), v.clone());
        }
        form = form.part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string()),
        );
        let resp = self
            .http
            .post(&params.endpoint_url)
            .multipart(form)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        aps::check(resp).await?;
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, BridgeError> {
        let resp = self.http.get(url).send().await.map_err(BridgeError::transport)?;
        let bytes = aps::check(resp).await?.bytes().await.map_err(BridgeError::transport)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl WorkItemApi for DesignAutomationClient {
    async fn create_work_item(&self, submission: &JobSubmission) -> Result<WorkItemStatus, BridgeError> {
        self.post_json("/workitems", &payload::workitem_body(submission)).await
    }

    async fn work_item_status(&self, id: &str) -> Result<WorkItemStatus, BridgeError> {
        let resp = Self::send(self.request(reqwest::Method::GET, &format!("/workitems/{id}")).await?).await?;
        aps::json(resp).await
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Brings nickname, app bundle and activity up to date once per process and
/// hands out the qualified activity id.
pub struct ActivityProvisioner {
    client: Arc<DesignAutomationClient>,
    settings: DaSettings,
    client_id: String,
    package_path: PathBuf,
    notifier: Arc<dyn Notifier>,
    resolved: OnceCell<String>,
}

impl ActivityProvisioner {
    pub fn new(
        client: Arc<DesignAutomationClient>,
        settings: DaSettings,
        client_id: impl Into<String>,
        package_path: PathBuf,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            settings,
            client_id: client_id.into(),
            package_path,
            notifier,
            resolved: OnceCell::new(),
        }
    }

    /// Qualified activity id, provisioning on first use.
    pub async fn activity_id(&self) -> Result<String, BridgeError> {
        self.resolved
            .get_or_try_init(|| async {
                self.provision().await.map_err(|e| match e {
                    BridgeError::Setup(_) => e,
                    other => BridgeError::setup(other),
                })
            })
            .await
            .cloned()
    }

    async fn progress(&self, text: String) {
        self.notifier.broadcast(Notification::Progress(text)).await;
    }

    async fn provision(&self) -> Result<String, BridgeError> {
        self.setup_owner().await?;
        let bundle = self.setup_app_bundle().await?;
        debug!(bundle = %bundle, "app bundle ready");
        self.setup_activity().await
    }

    async fn setup_owner(&self) -> Result<(), BridgeError> {
        let nickname = self.client.nickname().await?;
        if nickname == self.client_id {
            info!(nickname = %self.settings.owner, "claiming nickname");
            self.client.set_nickname(&self.settings.owner).await?;
        }
        Ok(())
    }

    async fn setup_app_bundle(&self) -> Result<String, BridgeError> {
        let alias = self.settings.bundle_alias();
        let body = payload::appbundle_body(&self.settings);
        let package = tokio::fs::read(&self.package_path).await.map_err(|e| {
            BridgeError::Setup(format!("read {}: {e}", self.package_path.display()))
        })?;

        let published = match self.client.app_bundle(&alias).await? {
            None => {
                info!(bundle = %alias, "creating app bundle");
                self.client
                    .create_versioned("appbundles", &body, &self.settings.label)
                    .await?
            }
            Some(existing) => {
                let remote_url = existing
                    .get("package")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| BridgeError::Setup(format!("{alias} has no package url")))?;
                let remote = self.client.download(remote_url).await?;
                if sha256_hex(&remote) == sha256_hex(&package) {
                    debug!(bundle = %alias, "app bundle unchanged");
                    return Ok(alias);
                }
                info!(bundle = %alias, "updating app bundle");
                self.client
                    .update_versioned("appbundles", &self.settings.bundle_name, &body, &self.settings.label)
                    .await?
            }
        };

        let params = published
            .upload_parameters
            .as_ref()
            .ok_or_else(|| BridgeError::Setup(format!("{alias} version without upload parameters")))?;
        self.client
            .upload_package(params, &self.settings.package_name, package)
            .await?;
        Ok(alias)
    }

    async fn setup_activity(&self) -> Result<String, BridgeError> {
        let alias = self.settings.activity_alias();
        let desired = payload::activity_body(&self.settings, COLLABORATION_NAME);

        match self.client.activity(&alias).await? {
            None => {
                self.progress(format!("Creating activity {alias} ...")).await;
                self.client
                    .create_versioned("activities", &desired, &self.settings.label)
                    .await?;
            }
            Some(existing) => {
                self.progress("\tFound existing activity...".into()).await;
                if !payload::activity_matches(&desired, &existing) {
                    self.progress(format!("\tUpdating activity {alias}...")).await;
                    self.client
                        .update_versioned("activities", &self.settings.activity, &desired, &self.settings.label)
                        .await?;
                }
            }
        }
        self.progress(format!("Activity: \n\t{desired}")).await;
        Ok(alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenSource;
    use crate::hub::{NotificationHub, ServerFrame};
    use collab_core::model::{ArgumentBinding, Credential, ScopeSet, WorkItemState};
    use tokio::sync::mpsc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixed;

    #[async_trait]
    impl TokenSource for Fixed {
        async fn fetch(&self, _: &ScopeSet) -> Result<Credential, BridgeError> {
            Ok(Credential::new("two-legged", i64::MAX))
        }
    }

    fn client(base: String) -> DesignAutomationClient {
        DesignAutomationClient::new(reqwest::Client::new(), base, Arc::new(TokenCache::new(Arc::new(Fixed))))
    }

    #[test]
    fn sha256_is_lower_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn work_item_is_submitted_with_bindings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workitems"))
            .and(header("authorization", "Bearer two-legged"))
            .and(body_partial_json(json!({
                "activityId": "adnworks.createcollaboration+prod",
                "arguments": { "inputFile": { "verb": "get", "url": "urn:in" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "wi-1", "status": "pending"
            })))
            .mount(&server)
            .await;

        let job = JobSubmission::new("adnworks.createcollaboration+prod")
            .bind("inputFile", ArgumentBinding::input("urn:in", "Bearer a"))
            .bind("collaboration", ArgumentBinding::output("urn:out", "Bearer b"));
        let status = client(server.uri()).create_work_item(&job).await.unwrap();
        assert_eq!(status.id, "wi-1");
        assert_eq!(status.status, WorkItemState::Pending);
    }

    #[tokio::test]
    async fn status_decodes_report_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/workitems/wi-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "wi-1", "status": "failedInstructions", "reportUrl": "https://r/1.txt"
            })))
            .mount(&server)
            .await;

        let status = client(server.uri()).work_item_status("wi-1").await.unwrap();
        assert_eq!(status.status, WorkItemState::FailedInstructions);
        assert_eq!(status.report_url.as_deref(), Some("https://r/1.txt"));
    }

    #[tokio::test]
    async fn nickname_conflict_is_a_setup_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/forgeapps/me"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = client(server.uri()).set_nickname("adnworks").await.unwrap_err();
        assert!(matches!(err, BridgeError::Setup(_)));
    }

    #[tokio::test]
    async fn missing_activity_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities/adnworks.createcollaboration+prod"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let found = client(server.uri())
            .activity("adnworks.createcollaboration+prod")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    const BUNDLE: &str = "/appbundles/adnworks.lmvextractor+prod";
    const ACTIVITY: &str = "/activities/adnworks.createcollaboration+prod";
    const PACKAGE: &[u8] = b"PK\x03\x04 extractor build 2";

    struct Setup {
        dir: tempfile::TempDir,
        events: mpsc::UnboundedReceiver<ServerFrame>,
        provisioner: ActivityProvisioner,
    }

    async fn setup(server: &MockServer) -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let package_path = dir.path().join("LMVExtractor.bundle.zip");
        std::fs::write(&package_path, PACKAGE).unwrap();
        let hub = Arc::new(NotificationHub::new());
        let events = hub.register("c1").await;
        let provisioner = ActivityProvisioner::new(
            Arc::new(client(server.uri())),
            DaSettings::default(),
            "cid",
            package_path,
            hub,
        );
        Setup {
            dir,
            events,
            provisioner,
        }
    }

    fn progress(events: &mut mpsc::UnboundedReceiver<ServerFrame>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(ServerFrame::Event(Notification::Progress(text))) = events.try_recv() {
            out.push(text);
        }
        out
    }

    async fn mount_owner(server: &MockServer, nickname: &str) {
        Mock::given(method("GET"))
            .and(path("/forgeapps/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(nickname)))
            .mount(server)
            .await;
    }

    async fn mount_bundle(server: &MockServer, remote: &[u8]) {
        Mock::given(method("GET"))
            .and(path(BUNDLE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "adnworks.lmvextractor",
                "version": 1,
                "package": format!("{}/pkg.zip", server.uri())
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pkg.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(remote.to_vec()))
            .mount(server)
            .await;
    }

    fn current_activity() -> Value {
        let mut a = payload::activity_body(&DaSettings::default(), COLLABORATION_NAME);
        a["id"] = json!("adnworks.createcollaboration");
        a["version"] = json!(1);
        a
    }

    async fn mount_activity(server: &MockServer, existing: Value) {
        Mock::given(method("GET"))
            .and(path(ACTIVITY))
            .respond_with(ResponseTemplate::new(200).set_body_json(existing))
            .mount(server)
            .await;
    }

    fn published(server: &MockServer, version: i64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "lmvextractor",
            "version": version,
            "uploadParameters": {
                "endpointURL": format!("{}/upload", server.uri()),
                "formData": { "key": "apps/lmvextractor/2" }
            }
        }))
    }

    async fn expect_upload(server: &MockServer, times: u64) {
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(204))
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn unclaimed_nickname_is_set_to_owner() {
        let server = MockServer::start().await;
        mount_owner(&server, "cid").await;
        Mock::given(method("PATCH"))
            .and(path("/forgeapps/me"))
            .and(body_partial_json(json!({ "nickname": "adnworks" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mount_bundle(&server, PACKAGE).await;
        mount_activity(&server, current_activity()).await;

        let s = setup(&server).await;
        let id = s.provisioner.activity_id().await.unwrap();
        assert_eq!(id, "adnworks.createcollaboration+prod");
    }

    #[tokio::test]
    async fn claimed_nickname_is_left_alone() {
        let server = MockServer::start().await;
        mount_owner(&server, "adnworks").await;
        Mock::given(method("PATCH"))
            .and(path("/forgeapps/me"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        mount_bundle(&server, PACKAGE).await;
        mount_activity(&server, current_activity()).await;

        let s = setup(&server).await;
        s.provisioner.activity_id().await.unwrap();
    }

    #[tokio::test]
    async fn missing_bundle_is_created_aliased_and_uploaded() {
        let server = MockServer::start().await;
        mount_owner(&server, "adnworks").await;
        Mock::given(method("GET"))
            .and(path(BUNDLE))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/appbundles"))
            .and(body_partial_json(json!({ "id": "lmvextractor", "engine": "Autodesk.AutoCAD+25_0" })))
            .respond_with(published(&server, 1))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/appbundles/lmvextractor/aliases"))
            .and(body_partial_json(json!({ "id": "prod", "version": 1 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "prod", "version": 1 })))
            .expect(1)
            .mount(&server)
            .await;
        expect_upload(&server, 1).await;
        mount_activity(&server, current_activity()).await;

        let s = setup(&server).await;
        s.provisioner.activity_id().await.unwrap();
    }

    #[tokio::test]
    async fn identical_package_is_not_republished() {
        let server = MockServer::start().await;
        mount_owner(&server, "adnworks").await;
        mount_bundle(&server, PACKAGE).await;
        Mock::given(method("POST"))
            .and(path("/appbundles/lmvextractor/versions"))
            .respond_with(published(&server, 2))
            .expect(0)
            .mount(&server)
            .await;
        expect_upload(&server, 0).await;
        mount_activity(&server, current_activity()).await;

        let mut s = setup(&server).await;
        s.provisioner.activity_id().await.unwrap();
        let events = progress(&mut s.events);
        assert_eq!(events.len(), 2, "{events:?}");
        assert_eq!(events[0], "\tFound existing activity...");
        assert!(events[1].starts_with("Activity: \n\t"));
    }

    #[tokio::test]
    async fn changed_package_publishes_a_new_version() {
        let server = MockServer::start().await;
        mount_owner(&server, "adnworks").await;
        mount_bundle(&server, b"PK\x03\x04 extractor build 1").await;
        Mock::given(method("POST"))
            .and(path("/appbundles/lmvextractor/versions"))
            .and(body_partial_json(json!({ "engine": "Autodesk.AutoCAD+25_0" })))
            .respond_with(published(&server, 2))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/appbundles/lmvextractor/aliases/prod"))
            .and(body_partial_json(json!({ "version": 2 })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        expect_upload(&server, 1).await;
        mount_activity(&server, current_activity()).await;

        let s = setup(&server).await;
        s.provisioner.activity_id().await.unwrap();
    }

    #[tokio::test]
    async fn missing_activity_is_created_with_progress() {
        let server = MockServer::start().await;
        mount_owner(&server, "adnworks").await;
        mount_bundle(&server, PACKAGE).await;
        Mock::given(method("GET"))
            .and(path(ACTIVITY))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/activities"))
            .and(body_partial_json(json!({ "id": "createcollaboration" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "createcollaboration", "version": 1 })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/activities/createcollaboration/aliases"))
            .and(body_partial_json(json!({ "id": "prod", "version": 1 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "prod", "version": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let mut s = setup(&server).await;
        s.provisioner.activity_id().await.unwrap();
        let events = progress(&mut s.events);
        assert_eq!(events.len(), 2, "{events:?}");
        assert_eq!(events[0], "Creating activity adnworks.createcollaboration+prod ...");
        assert!(events[1].starts_with("Activity: \n\t"));
    }

    #[tokio::test]
    async fn outdated_activity_gets_a_new_version() {
        let server = MockServer::start().await;
        mount_owner(&server, "adnworks").await;
        mount_bundle(&server, PACKAGE).await;
        let mut outdated = current_activity();
        outdated["engine"] = json!("Autodesk.AutoCAD+24_3");
        mount_activity(&server, outdated).await;
        Mock::given(method("POST"))
            .and(path("/activities/createcollaboration/versions"))
            .and(body_partial_json(json!({ "engine": "Autodesk.AutoCAD+25_0" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": 2 })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/activities/createcollaboration/aliases/prod"))
            .and(body_partial_json(json!({ "version": 2 })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut s = setup(&server).await;
        s.provisioner.activity_id().await.unwrap();
        let events = progress(&mut s.events);
        assert_eq!(events.len(), 3, "{events:?}");
        assert_eq!(events[0], "\tFound existing activity...");
        assert_eq!(events[1], "\tUpdating activity adnworks.createcollaboration+prod...");
        assert!(events[2].starts_with("Activity: \n\t"));
    }

    #[tokio::test]
    async fn provisioning_runs_once_per_process() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forgeapps/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("adnworks")))
            .expect(1)
            .mount(&server)
            .await;
        mount_bundle(&server, PACKAGE).await;
        mount_activity(&server, current_activity()).await;

        let mut s = setup(&server).await;
        let a = s.provisioner.activity_id().await.unwrap();
        let b = s.provisioner.activity_id().await.unwrap();
        assert_eq!(a, b);
        // Only the first call reports progress.
        assert_eq!(progress(&mut s.events).len(), 2);
    }

    #[tokio::test]
    async fn failed_provisioning_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forgeapps/me"))
            .respond_with(ResponseTemplate::new(500).set_body_string("unavailable"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        mount_owner(&server, "adnworks").await;
        mount_bundle(&server, PACKAGE).await;
        mount_activity(&server, current_activity()).await;

        let s = setup(&server).await;
        let err = s.provisioner.activity_id().await.unwrap_err();
        match err {
            BridgeError::Setup(m) => assert!(m.contains("unavailable")),
            other => panic!("unexpected {other:?}"),
        }
        let id = s.provisioner.activity_id().await.unwrap();
        assert_eq!(id, "adnworks.createcollaboration+prod");
    }

    #[tokio::test]
    async fn unreadable_package_is_a_setup_failure() {
        let server = MockServer::start().await;
        mount_owner(&server, "adnworks").await;

        let s = setup(&server).await;
        std::fs::remove_file(s.dir.path().join("LMVExtractor.bundle.zip")).unwrap();
        let err = s.provisioner.activity_id().await.unwrap_err();
        match err {
            BridgeError::Setup(m) => assert!(m.contains("LMVExtractor.bundle.zip"), "{m}"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
