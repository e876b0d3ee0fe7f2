use std::path::PathBuf;
use std::sync::Arc;

use collab_core::api::{StartWorkitemResponse, WorkitemRequest};
use collab_core::model::{ArgumentBinding, DestinationVersionTarget, JobSubmission, SessionTokens};
use collab_core::settings::{COLLABORATION_NAME, INPUT_ARGUMENT, INPUT_DRAWING, OUTPUT_ARGUMENT};
use collab_core::BridgeError;
use tracing::info;

use crate::auth::TokenCache;
use crate::da::{ActivityProvisioner, WorkItemApi};
use crate::dm::DataManagementClient;
use crate::monitor::{MonitorDeps, WorkItemMonitor};
use crate::oss::ObjectStorageClient;

/// Starts collaboration jobs and hands them to a detached monitor.
pub struct WorkItemService {
    storage: Arc<ObjectStorageClient>,
    dm: Arc<DataManagementClient>,
    work_items: Arc<dyn WorkItemApi>,
    activities: Arc<ActivityProvisioner>,
    tokens: Arc<TokenCache>,
    monitor: MonitorDeps,
    bucket_key: String,
    input_path: PathBuf,
}

impl WorkItemService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<ObjectStorageClient>,
        dm: Arc<DataManagementClient>,
        work_items: Arc<dyn WorkItemApi>,
        activities: Arc<ActivityProvisioner>,
        tokens: Arc<TokenCache>,
        monitor: MonitorDeps,
        bucket_key: impl Into<String>,
        input_path: PathBuf,
    ) -> Self {
        Self {
            storage,
            dm,
            work_items,
            activities,
            tokens,
            monitor,
            bucket_key: bucket_key.into(),
            input_path,
        }
    }

    /// Uploads the input, reserves the output, submits the work item and
    /// returns as soon as the service has accepted it.
    pub async fn start_workitem(
        &self,
        req: &WorkitemRequest,
        session: SessionTokens,
    ) -> Result<StartWorkitemResponse, BridgeError> {
        info!(
            hub_id = %req.hub_id,
            project_id = %req.project_id,
            folder_id = %req.folder_id,
            "work item requested"
        );

        let input_object = self
            .storage
            .upload_file(&self.bucket_key, INPUT_DRAWING, &self.input_path)
            .await?;
        let output_storage = self
            .dm
            .create_storage(&session.internal_token, &req.project_id, &req.folder_id, COLLABORATION_NAME)
            .await?;

        // Input is read from our bucket; output is written into the user's folder.
        let two_legged = self.tokens.internal().await?;
        let activity = self.activities.activity_id().await?;
        let job = JobSubmission::new(activity)
            .bind(INPUT_ARGUMENT, ArgumentBinding::input(input_object, two_legged.bearer()))
            .bind(
                OUTPUT_ARGUMENT,
                ArgumentBinding::output(output_storage.clone(), session.internal_bearer()),
            );

        let status = self.work_items.create_work_item(&job).await?;
        info!(job_id = %status.id, state = %status.status, "work item submitted");

        let target = DestinationVersionTarget {
            display_name: COLLABORATION_NAME.to_string(),
            folder_id: req.folder_id.clone(),
            project_id: req.project_id.clone(),
        };
        let work_item_id = status.id.clone();
        WorkItemMonitor::new(
            self.monitor.clone(),
            req.browser_connection_id.clone(),
            target,
            output_storage,
            session,
        )
        .spawn(status);

        Ok(StartWorkitemResponse { work_item_id })
    }
}
