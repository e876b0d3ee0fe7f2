use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// OAuth scope understood by the platform authentication service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    #[serde(rename = "viewables:read")]
    ViewablesRead,
    #[serde(rename = "data:read")]
    DataRead,
    #[serde(rename = "data:write")]
    DataWrite,
    #[serde(rename = "data:create")]
    DataCreate,
    #[serde(rename = "data:search")]
    DataSearch,
    #[serde(rename = "bucket:create")]
    BucketCreate,
    #[serde(rename = "bucket:read")]
    BucketRead,
    #[serde(rename = "bucket:update")]
    BucketUpdate,
    #[serde(rename = "bucket:delete")]
    BucketDelete,
    #[serde(rename = "code:all")]
    CodeAll,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::ViewablesRead => "viewables:read",
            Scope::DataRead => "data:read",
            Scope::DataWrite => "data:write",
            Scope::DataCreate => "data:create",
            Scope::DataSearch => "data:search",
            Scope::BucketCreate => "bucket:create",
            Scope::BucketRead => "bucket:read",
            Scope::BucketUpdate => "bucket:update",
            Scope::BucketDelete => "bucket:delete",
            Scope::CodeAll => "code:all",
        }
    }
}

/// A normalized (sorted, de-duplicated) set of scopes.
///
/// Two sets listing the same scopes in a different order compare equal, so
/// they share one cache slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeSet(Vec<Scope>);

impl ScopeSet {
    pub fn new(scopes: impl IntoIterator<Item = Scope>) -> Self {
        let mut v: Vec<Scope> = scopes.into_iter().collect();
        v.sort();
        v.dedup();
        Self(v)
    }

    /// Narrow scope handed to the browser viewer.
    pub fn public() -> Self {
        Self::new([Scope::ViewablesRead])
    }

    /// Broad two-legged scope used for storage uploads and job execution.
    pub fn internal() -> Self {
        Self::new([
            Scope::BucketCreate,
            Scope::BucketRead,
            Scope::DataRead,
            Scope::DataWrite,
            Scope::DataCreate,
            Scope::CodeAll,
        ])
    }

    /// Scope requested for the three-legged user session.
    pub fn session() -> Self {
        Self::new([
            Scope::DataRead,
            Scope::DataCreate,
            Scope::DataSearch,
            Scope::DataWrite,
            Scope::BucketRead,
            Scope::BucketCreate,
            Scope::BucketDelete,
            Scope::BucketUpdate,
            Scope::ViewablesRead,
        ])
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(|s| s.as_str()).collect();
        f.write_str(&joined.join(" "))
    }
}

/// Short-lived bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    /// Expiry timestamp (unix ms).
    pub expires_at_ms: i64,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, expires_at_ms: i64) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at_ms,
        }
    }

    /// Builds a credential from a token response's relative lifetime.
    pub fn expiring_in(access_token: impl Into<String>, now_ms: i64, expires_in_secs: i64) -> Self {
        Self::new(access_token, now_ms + expires_in_secs * 1000)
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Tokens of one three-legged user session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionTokens {
    pub internal_token: String,
    pub public_token: String,
    pub refresh_token: String,
    pub expires_at_ms: i64,
}

impl SessionTokens {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Remaining lifetime in whole seconds, zero once expired.
    pub fn expires_in_secs(&self, now_ms: i64) -> i64 {
        ((self.expires_at_ms - now_ms) / 1000).max(0)
    }

    pub fn internal_bearer(&self) -> String {
        format!("Bearer {}", self.internal_token)
    }
}

/// Data flow direction of a work item argument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// HTTP verb the job service uses to move the file.
    pub fn verb(self) -> &'static str {
        match self {
            Direction::Input => "get",
            Direction::Output => "put",
        }
    }
}

/// One declared input or output of a submitted work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArgumentBinding {
    pub direction: Direction,
    pub remote_location: String,
    pub auth_header: String,
}

impl ArgumentBinding {
    pub fn input(remote_location: impl Into<String>, auth_header: impl Into<String>) -> Self {
        Self {
            direction: Direction::Input,
            remote_location: remote_location.into(),
            auth_header: auth_header.into(),
        }
    }

    pub fn output(remote_location: impl Into<String>, auth_header: impl Into<String>) -> Self {
        Self {
            direction: Direction::Output,
            remote_location: remote_location.into(),
            auth_header: auth_header.into(),
        }
    }
}

/// A unit of remote work. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSubmission {
    pub activity_reference: String,
    pub argument_bindings: BTreeMap<String, ArgumentBinding>,
}

impl JobSubmission {
    pub fn new(activity_reference: impl Into<String>) -> Self {
        Self {
            activity_reference: activity_reference.into(),
            argument_bindings: BTreeMap::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, binding: ArgumentBinding) -> Self {
        self.argument_bindings.insert(name.into(), binding);
        self
    }
}

/// Work item state as reported by the job service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkItemState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "inprogress")]
    InProgress,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "failedLimitDataSize")]
    FailedLimitDataSize,
    #[serde(rename = "failedLimitProcessingTime")]
    FailedLimitProcessingTime,
    #[serde(rename = "failedDownload")]
    FailedDownload,
    #[serde(rename = "failedInstructions")]
    FailedInstructions,
    #[serde(rename = "failedUpload")]
    FailedUpload,
    #[serde(rename = "failedUploadOptional")]
    FailedUploadOptional,
    #[serde(rename = "success")]
    Success,
    /// Any state this build does not know about. Treated as terminal.
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl WorkItemState {
    /// Everything except pending and in-progress is terminal.
    pub fn is_done(self) -> bool {
        !matches!(self, WorkItemState::Pending | WorkItemState::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkItemState::Pending => "pending",
            WorkItemState::InProgress => "inprogress",
            WorkItemState::Cancelled => "cancelled",
            WorkItemState::FailedLimitDataSize => "failedLimitDataSize",
            WorkItemState::FailedLimitProcessingTime => "failedLimitProcessingTime",
            WorkItemState::FailedDownload => "failedDownload",
            WorkItemState::FailedInstructions => "failedInstructions",
            WorkItemState::FailedUpload => "failedUpload",
            WorkItemState::FailedUploadOptional => "failedUploadOptional",
            WorkItemState::Success => "success",
            WorkItemState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WorkItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a work item. Replaced wholesale on every poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemStatus {
    pub id: String,
    pub status: WorkItemState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
}

impl WorkItemStatus {
    pub fn new(id: impl Into<String>, status: WorkItemState) -> Self {
        Self {
            id: id.into(),
            status,
            progress: None,
            report_url: None,
            stats: None,
        }
    }

    pub fn with_report_url(mut self, url: impl Into<String>) -> Self {
        self.report_url = Some(url.into());
        self
    }
}

/// Renders the snapshot the way it is shown in the browser log.
impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{} {}", self.id, self.status),
        }
    }
}

/// Where a job's output should land.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationVersionTarget {
    pub display_name: String,
    pub folder_id: String,
    pub project_id: String,
}

/// One entry of a folder listing, reduced to what reconciliation needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub display_name: Option<String>,
}

impl FolderEntry {
    /// Parses a JSON:API resource object (`{type, id, attributes: {displayName}}`).
    pub fn from_resource(value: &serde_json::Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        let entry_type = value.get("type")?.as_str()?.to_string();
        let display_name = value
            .pointer("/attributes/displayName")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Some(Self {
            id,
            entry_type,
            display_name,
        })
    }

    pub fn is_item_named(&self, name: &str) -> bool {
        self.entry_type == "items" && self.display_name.as_deref() == Some(name)
    }
}

/// Server-to-client push event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "payload")]
pub enum Notification {
    #[serde(rename = "onProgress")]
    Progress(String),
    #[serde(rename = "onComplete")]
    Complete(String),
    #[serde(rename = "onSuccess")]
    Success(String),
}

impl Notification {
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::Progress(_) => "onProgress",
            Notification::Complete(_) => "onComplete",
            Notification::Success(_) => "onSuccess",
        }
    }
}

/// Final `complete` payload of every non-failing job.
pub const DONE_MESSAGE: &str = "Done!!";

/// What reconciliation did with the job output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A matching item existed and received a new version.
    VersionCreated { version_id: String },
    /// No matching item existed; a new one was created.
    ItemCreated { item_id: String },
}

impl ReconcileOutcome {
    pub fn message(&self) -> String {
        match self {
            ReconcileOutcome::VersionCreated { version_id } => {
                format!("Collaboration exists, a new {version_id} is created")
            }
            ReconcileOutcome::ItemCreated { item_id } => {
                format!("Collaboration file created with ID: {item_id}")
            }
        }
    }
}
