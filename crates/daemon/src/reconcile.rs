//! Files a job output into its destination folder.

use async_trait::async_trait;
use collab_core::model::{DestinationVersionTarget, FolderEntry, ReconcileOutcome};
use collab_core::BridgeError;
use tracing::info;

/// Folder listing and item/version creation in the destination storage.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Every entry of the folder, all pages.
    async fn folder_contents(
        &self,
        token: &str,
        project_id: &str,
        folder_id: &str,
    ) -> Result<Vec<FolderEntry>, BridgeError>;

    /// Returns the new item id.
    async fn create_item(
        &self,
        token: &str,
        target: &DestinationVersionTarget,
        storage_id: &str,
    ) -> Result<String, BridgeError>;

    /// Returns the new version id.
    async fn create_version(
        &self,
        token: &str,
        target: &DestinationVersionTarget,
        item_id: &str,
        storage_id: &str,
    ) -> Result<String, BridgeError>;
}

/// Appends a version to the item named like the target, or creates the item.
///
/// Exactly one of the two writes happens. Nothing is retried.
pub async fn reconcile(
    store: &dyn VersionStore,
    token: &str,
    target: &DestinationVersionTarget,
    storage_id: &str,
) -> Result<ReconcileOutcome, BridgeError> {
    let entries = store
        .folder_contents(token, &target.project_id, &target.folder_id)
        .await
        .map_err(into_reconciliation)?;

    match entries.iter().find(|e| e.is_item_named(&target.display_name)) {
        Some(item) => {
            let version_id = store
                .create_version(token, target, &item.id, storage_id)
                .await
                .map_err(into_reconciliation)?;
            info!(item_id = %item.id, version_id = %version_id, "version created");
            Ok(ReconcileOutcome::VersionCreated { version_id })
        }
        None => {
            let item_id = store
                .create_item(token, target, storage_id)
                .await
                .map_err(into_reconciliation)?;
            info!(item_id = %item_id, folder_id = %target.folder_id, "item created");
            Ok(ReconcileOutcome::ItemCreated { item_id })
        }
    }
}

fn into_reconciliation(e: BridgeError) -> BridgeError {
    match e {
        BridgeError::Reconciliation(_) => e,
        other => BridgeError::reconciliation(other),
    }
}
