use async_trait::async_trait;
use collab_core::BridgeError;

use crate::aps;

/// Downloads the human readable report of a finished work item.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    async fn fetch_report(&self, url: &str) -> Result<String, BridgeError>;
}

/// Plain unauthenticated GET; the report URL is pre-signed.
pub struct HttpReportFetcher {
    http: reqwest::Client,
}

impl HttpReportFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ReportFetcher for HttpReportFetcher {
    async fn fetch_report(&self, url: &str) -> Result<String, BridgeError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        let bytes = aps::check(resp)
            .await?
            .bytes()
            .await
            .map_err(BridgeError::transport)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
