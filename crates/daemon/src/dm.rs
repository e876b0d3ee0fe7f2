//! Data Management REST client (hubs, projects, folders, items, versions).

use async_trait::async_trait;
use collab_core::model::{DestinationVersionTarget, FolderEntry};
use collab_core::payload;
use collab_core::BridgeError;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use crate::aps::{self, JSON_API};
use crate::reconcile::VersionStore;

/// Upper bound on followed `links.next` pages of one listing.
const MAX_PAGES: usize = 100;

pub struct DataManagementClient {
    http: reqwest::Client,
    base_url: String,
}

impl DataManagementClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn get(&self, token: &str, url: &str) -> Result<Value, BridgeError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        aps::json(resp).await
    }

    /// Follows pagination and concatenates every page's `data` array.
    async fn get_all(&self, token: &str, path: &str) -> Result<Vec<Value>, BridgeError> {
        let mut out = Vec::new();
        let mut next = Some(aps::join(&self.base_url, path));
        let mut pages = 0;
        while let Some(url) = next.take() {
            // Never hand out a truncated listing.
            if pages == MAX_PAGES {
                return Err(BridgeError::Transport(format!(
                    "{path}: listing exceeds {MAX_PAGES} pages"
                )));
            }
            let page = self.get(token, &url).await?;
            if let Some(Value::Array(items)) = page.get("data") {
                out.extend(items.iter().cloned());
            }
            pages += 1;
            next = page
                .pointer("/links/next/href")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        debug!(path = %path, pages, entries = out.len(), "listing fetched");
        Ok(out)
    }

    async fn post(&self, token: &str, path: &str, body: &Value) -> Result<String, BridgeError> {
        let resp = self
            .http
            .post(aps::join(&self.base_url, path))
            .bearer_auth(token)
            .header(CONTENT_TYPE, JSON_API)
            .body(body.to_string())
            .send()
            .await
            .map_err(BridgeError::transport)?;
        let created: Value = aps::json(resp).await?;
        created
            .pointer("/data/id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| BridgeError::Transport(format!("{path}: response without data.id")))
    }

    pub async fn hubs(&self, token: &str) -> Result<Vec<Value>, BridgeError> {
        self.get_all(token, "/project/v1/hubs").await
    }

    pub async fn projects(&self, token: &str, hub_id: &str) -> Result<Vec<Value>, BridgeError> {
        self.get_all(token, &format!("/project/v1/hubs/{hub_id}/projects")).await
    }

    pub async fn top_folders(
        &self,
        token: &str,
        hub_id: &str,
        project_id: &str,
    ) -> Result<Vec<Value>, BridgeError> {
        self.get_all(
            token,
            &format!("/project/v1/hubs/{hub_id}/projects/{project_id}/topFolders"),
        )
        .await
    }

    pub async fn folder_listing(
        &self,
        token: &str,
        project_id: &str,
        folder_id: &str,
    ) -> Result<Vec<Value>, BridgeError> {
        self.get_all(
            token,
            &format!("/data/v1/projects/{project_id}/folders/{folder_id}/contents"),
        )
        .await
    }

    pub async fn item_versions(
        &self,
        token: &str,
        project_id: &str,
        item_id: &str,
    ) -> Result<Vec<Value>, BridgeError> {
        self.get_all(
            token,
            &format!("/data/v1/projects/{project_id}/items/{item_id}/versions"),
        )
        .await
    }

    /// Reserves a storage object for `name` in the folder; returns its id.
    pub async fn create_storage(
        &self,
        token: &str,
        project_id: &str,
        folder_id: &str,
        name: &str,
    ) -> Result<String, BridgeError> {
        self.post(
            token,
            &format!("/data/v1/projects/{project_id}/storage"),
            &payload::storage_payload(folder_id, name),
        )
        .await
    }
}

#[async_trait]
impl VersionStore for DataManagementClient {
    async fn folder_contents(
        &self,
        token: &str,
        project_id: &str,
        folder_id: &str,
    ) -> Result<Vec<FolderEntry>, BridgeError> {
        let raw = self.folder_listing(token, project_id, folder_id).await?;
        Ok(raw.iter().filter_map(FolderEntry::from_resource).collect())
    }

    async fn create_item(
        &self,
        token: &str,
        target: &DestinationVersionTarget,
        storage_id: &str,
    ) -> Result<String, BridgeError> {
        let body = payload::item_payload(
            &target.project_id,
            &target.folder_id,
            storage_id,
            &target.display_name,
        );
        self.post(token, &format!("/data/v1/projects/{}/items", target.project_id), &body)
            .await
    }

    async fn create_version(
        &self,
        token: &str,
        target: &DestinationVersionTarget,
        item_id: &str,
        storage_id: &str,
    ) -> Result<String, BridgeError> {
        let body = payload::version_payload(
            &target.project_id,
            item_id,
            storage_id,
            &target.display_name,
        );
        self.post(token, &format!("/data/v1/projects/{}/versions", target.project_id), &body)
            .await
    }
}
