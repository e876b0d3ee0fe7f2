//! Object storage: working bucket and signed uploads of job inputs.

use std::path::Path;
use std::sync::Arc;

use collab_core::BridgeError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::aps;
use crate::auth::TokenCache;

pub struct ObjectStorageClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenCache>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedUpload {
    upload_key: String,
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectDetails {
    object_id: String,
}

impl ObjectStorageClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: Arc<TokenCache>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    /// Creates the bucket (transient, US) unless it already exists.
    pub async fn ensure_bucket(&self, bucket_key: &str) -> Result<(), BridgeError> {
        let token = self.tokens.internal().await?;
        let resp = self
            .http
            .get(aps::join(&self.base_url, &format!("/oss/v2/buckets/{bucket_key}/details")))
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        if resp.status() != StatusCode::NOT_FOUND {
            aps::check(resp).await?;
            return Ok(());
        }

        let resp = self
            .http
            .post(aps::join(&self.base_url, "/oss/v2/buckets"))
            .bearer_auth(&token.access_token)
            .header("x-ads-region", "US")
            .json(&json!({ "bucketKey": bucket_key, "policyKey": "transient" }))
            .send()
            .await
            .map_err(BridgeError::transport)?;
        aps::check(resp).await?;
        info!(bucket = %bucket_key, "bucket created");
        Ok(())
    }

    /// Uploads `bytes` through a signed S3 URL; returns the object id.
    pub async fn upload(
        &self,
        bucket_key: &str,
        object_key: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BridgeError> {
        let token = self.tokens.internal().await?;
        let signed_path = format!("/oss/v2/buckets/{bucket_key}/objects/{object_key}/signeds3upload");

        let resp = self
            .http
            .get(aps::join(&self.base_url, &signed_path))
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        let signed: SignedUpload = aps::json(resp).await?;
        let target = signed
            .urls
            .first()
            .ok_or_else(|| BridgeError::Transport("signed upload without urls".into()))?;

        let resp = self
            .http
            .put(target)
            .body(bytes)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        aps::check(resp).await?;

        let resp = self
            .http
            .post(aps::join(&self.base_url, &signed_path))
            .bearer_auth(&token.access_token)
            .json(&json!({ "uploadKey": signed.upload_key }))
            .send()
            .await
            .map_err(BridgeError::transport)?;
        let details: ObjectDetails = aps::json(resp).await?;
        Ok(details.object_id)
    }

    /// Ensures the bucket, then uploads the file at `path`.
    pub async fn upload_file(
        &self,
        bucket_key: &str,
        object_key: &str,
        path: &Path,
    ) -> Result<String, BridgeError> {
        self.ensure_bucket(bucket_key).await?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BridgeError::Transport(format!("read {}: {e}", path.display())))?;
        let object_id = self.upload(bucket_key, object_key, bytes).await?;
        info!(bucket = %bucket_key, object = %object_key, "input uploaded");
        Ok(object_id)
    }
}
