//! Lifecycle of one submitted work item, from the submission response to its
//! final notification.
//!
//! Each job emits, to the single connection that submitted it:
//! `progress* complete(report) success? complete("Done!!")`. Any failure on
//! the way ends the job with one `complete(<error text>)` instead.

use std::sync::Arc;
use std::time::Duration;

use collab_core::model::{
    DestinationVersionTarget, Notification, SessionTokens, WorkItemState, WorkItemStatus, DONE_MESSAGE,
};
use collab_core::BridgeError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::da::WorkItemApi;
use crate::hub::Notifier;
use crate::reconcile::{reconcile, VersionStore};
use crate::report::ReportFetcher;

/// Collaborators shared by every monitor.
#[derive(Clone)]
pub struct MonitorDeps {
    pub work_items: Arc<dyn WorkItemApi>,
    pub reports: Arc<dyn ReportFetcher>,
    pub versions: Arc<dyn VersionStore>,
    pub notifier: Arc<dyn Notifier>,
    pub poll_interval: Duration,
}

pub struct WorkItemMonitor {
    deps: MonitorDeps,
    connection_id: String,
    target: DestinationVersionTarget,
    storage_id: String,
    tokens: SessionTokens,
}

impl WorkItemMonitor {
    pub fn new(
        deps: MonitorDeps,
        connection_id: impl Into<String>,
        target: DestinationVersionTarget,
        storage_id: impl Into<String>,
        tokens: SessionTokens,
    ) -> Self {
        Self {
            deps,
            connection_id: connection_id.into(),
            target,
            storage_id: storage_id.into(),
            tokens,
        }
    }

    /// Detaches the monitor. The handle is only useful to tests.
    pub fn spawn(self, initial: WorkItemStatus) -> JoinHandle<()> {
        tokio::spawn(self.run(initial))
    }

    /// Runs to completion; never fails.
    pub async fn run(self, initial: WorkItemStatus) {
        let job_id = initial.id.clone();
        if let Err(e) = self.drive(initial).await {
            warn!(job_id = %job_id, connection_id = %self.connection_id, error = %e, "work item monitor failed");
            self.emit(Notification::Complete(e.to_string())).await;
        }
    }

    async fn drive(&self, initial: WorkItemStatus) -> Result<(), BridgeError> {
        let mut status = initial;
        while !status.status.is_done() {
            tokio::time::sleep(self.deps.poll_interval).await;
            status = self.deps.work_items.work_item_status(&status.id).await?;
            debug!(job_id = %status.id, state = %status.status, "polled");
            self.emit(Notification::Progress(status.to_string())).await;
        }
        info!(job_id = %status.id, state = %status.status, "work item finished");

        let report_url = status.report_url.as_deref().ok_or_else(|| {
            BridgeError::Transport(format!("work item {} has no report url", status.id))
        })?;
        let report = self.deps.reports.fetch_report(report_url).await?;
        self.emit(Notification::Complete(report)).await;

        if status.status == WorkItemState::Success {
            let outcome = reconcile(
                self.deps.versions.as_ref(),
                &self.tokens.internal_token,
                &self.target,
                &self.storage_id,
            )
            .await?;
            self.emit(Notification::Success(outcome.message())).await;
        } else {
            let failure = BridgeError::RemoteJob {
                id: status.id.clone(),
                state: status.status,
            };
            warn!(error = %failure, "output not filed");
        }

        self.emit(Notification::Complete(DONE_MESSAGE.to_string())).await;
        Ok(())
    }

    async fn emit(&self, notification: Notification) {
        self.deps.notifier.send(&self.connection_id, notification).await;
    }
}
