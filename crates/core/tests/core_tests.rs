//! Integration tests for the core crate.

use collab_core::api::{parse_workitem_data, StartWorkitemResponse};
use collab_core::model::{
    ArgumentBinding, Credential, FolderEntry, JobSubmission, Notification, ReconcileOutcome,
    Scope, ScopeSet, SessionTokens, WorkItemState, WorkItemStatus,
};
use collab_core::payload::{item_payload, storage_payload, version_payload, workitem_body};
use collab_core::BridgeError;

#[test]
fn test_work_item_state_serde() {
    let s: WorkItemState = serde_json::from_str(r#""inprogress""#).unwrap();
    assert_eq!(s, WorkItemState::InProgress);
    let s: WorkItemState = serde_json::from_str(r#""failedUploadOptional""#).unwrap();
    assert_eq!(s, WorkItemState::FailedUploadOptional);
    let s: WorkItemState = serde_json::from_str(r#""somethingNew""#).unwrap();
    assert_eq!(s, WorkItemState::Unknown);
    assert_eq!(serde_json::to_string(&WorkItemState::Success).unwrap(), r#""success""#);
}

#[test]
fn test_terminal_states() {
    assert!(!WorkItemState::Pending.is_done());
    assert!(!WorkItemState::InProgress.is_done());
    for s in [
        WorkItemState::Success,
        WorkItemState::Cancelled,
        WorkItemState::FailedInstructions,
        WorkItemState::FailedLimitProcessingTime,
        WorkItemState::FailedDownload,
        WorkItemState::Unknown,
    ] {
        assert!(s.is_done(), "{s} should be terminal");
    }
}

#[test]
fn test_work_item_status_from_service_json() {
    let body = r#"{
        "status": "success",
        "reportUrl": "https://reports.example/wi-1.txt",
        "stats": {"timeQueued": "2024-01-01T00:00:00Z"},
        "id": "wi-1"
    }"#;
    let st: WorkItemStatus = serde_json::from_str(body).unwrap();
    assert_eq!(st.id, "wi-1");
    assert_eq!(st.status, WorkItemState::Success);
    assert_eq!(st.report_url.as_deref(), Some("https://reports.example/wi-1.txt"));

    let rendered = st.to_string();
    assert!(rendered.contains("\"status\": \"success\""));
    assert!(rendered.contains("wi-1"));
}

#[test]
fn test_scope_set_is_order_insensitive() {
    let a = ScopeSet::new([Scope::DataRead, Scope::CodeAll, Scope::DataRead]);
    let b = ScopeSet::new([Scope::CodeAll, Scope::DataRead]);
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "data:read code:all");
    assert_eq!(ScopeSet::public().to_string(), "viewables:read");
    assert!(ScopeSet::internal().to_string().contains("code:all"));
}

#[test]
fn test_credential_expiry_boundary() {
    let c = Credential::new("t", 10_000);
    assert!(!c.is_expired_at(9_999));
    assert!(c.is_expired_at(10_000));
    assert_eq!(c.bearer(), "Bearer t");
}

#[test]
fn test_session_remaining_lifetime() {
    let t = SessionTokens {
        internal_token: "i".into(),
        public_token: "p".into(),
        refresh_token: "r".into(),
        expires_at_ms: 10_000,
    };
    assert_eq!(t.expires_in_secs(4_000), 6);
    assert_eq!(t.expires_in_secs(20_000), 0);
    assert!(t.is_expired_at(10_000));
    assert_eq!(t.internal_bearer(), "Bearer i");
}

#[test]
fn test_notification_wire_shape() {
    let n = Notification::Progress("tick".into());
    assert_eq!(
        serde_json::to_value(&n).unwrap(),
        serde_json::json!({"event": "onProgress", "payload": "tick"})
    );
    assert_eq!(Notification::Success("ok".into()).event_name(), "onSuccess");
}

#[test]
fn test_reconcile_messages() {
    let v = ReconcileOutcome::VersionCreated { version_id: "urn:v:2".into() };
    assert_eq!(v.message(), "Collaboration exists, a new urn:v:2 is created");
    let i = ReconcileOutcome::ItemCreated { item_id: "urn:i:1".into() };
    assert_eq!(i.message(), "Collaboration file created with ID: urn:i:1");
}

#[test]
fn test_folder_entry_matching() {
    let item = serde_json::json!({
        "type": "items",
        "id": "urn:item:1",
        "attributes": {"displayName": "House.collaboration"}
    });
    let folder = serde_json::json!({
        "type": "folders",
        "id": "urn:folder:1",
        "attributes": {"displayName": "House.collaboration"}
    });
    let item = FolderEntry::from_resource(&item).unwrap();
    let folder = FolderEntry::from_resource(&folder).unwrap();
    assert!(item.is_item_named("House.collaboration"));
    assert!(!item.is_item_named("house.collaboration"));
    assert!(!folder.is_item_named("House.collaboration"));
    assert!(FolderEntry::from_resource(&serde_json::json!({"id": 3})).is_none());
}

#[test]
fn test_parse_workitem_data() {
    let ok = parse_workitem_data(Some(
        r#"{"hubId":"b.h","projectId":"b.p","folderId":"urn:f","browserConnectionId":"c1"}"#,
    ))
    .unwrap();
    assert_eq!(ok.project_id, "b.p");
    assert_eq!(ok.browser_connection_id, "c1");

    assert_eq!(
        parse_workitem_data(None).unwrap_err(),
        BridgeError::BadRequest("Missing Data".into())
    );
    assert_eq!(
        parse_workitem_data(Some("  ")).unwrap_err(),
        BridgeError::BadRequest("Missing Data".into())
    );
    assert_eq!(
        parse_workitem_data(Some("{not json")).unwrap_err(),
        BridgeError::BadRequest("Invalid JSON format".into())
    );
    assert_eq!(
        parse_workitem_data(Some("null")).unwrap_err(),
        BridgeError::BadRequest("Invalid JSON format".into())
    );
    assert_eq!(
        parse_workitem_data(Some(r#"{"projectId":"p","folderId":"f"}"#)).unwrap_err(),
        BridgeError::BadRequest("Missing browserConnectionId".into())
    );
}

#[test]
fn test_start_response_field_name() {
    let r = StartWorkitemResponse { work_item_id: "wi-9".into() };
    assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"WorkItemId":"wi-9"}"#);
}

#[test]
fn test_workitem_body_bindings() {
    let sub = JobSubmission::new("adnworks.createcollaboration+prod")
        .bind("inputFile", ArgumentBinding::input("urn:in", "Bearer a"))
        .bind("collaboration", ArgumentBinding::output("urn:out", "Bearer b"));
    let body = workitem_body(&sub);
    assert_eq!(body["activityId"], "adnworks.createcollaboration+prod");
    assert_eq!(body["arguments"]["inputFile"]["verb"], "get");
    assert_eq!(body["arguments"]["collaboration"]["verb"], "put");
    assert_eq!(body["arguments"]["collaboration"]["url"], "urn:out");
    assert_eq!(body["arguments"]["inputFile"]["headers"]["Authorization"], "Bearer a");
}

#[test]
fn test_data_management_payloads() {
    let storage = storage_payload("urn:folder", "House.collaboration");
    assert_eq!(storage["data"]["relationships"]["target"]["data"]["id"], "urn:folder");

    let item = item_payload("b.project", "urn:folder", "urn:storage", "House.collaboration");
    assert_eq!(item["data"]["attributes"]["extension"]["type"], "items:autodesk.bim360:File");
    assert_eq!(item["included"][0]["relationships"]["storage"]["data"]["id"], "urn:storage");

    let item = item_payload("a.personal", "urn:folder", "urn:storage", "House.collaboration");
    assert_eq!(item["data"]["attributes"]["extension"]["type"], "items:autodesk.core:File");

    let version = version_payload("b.project", "urn:item", "urn:storage", "House.collaboration");
    assert_eq!(version["data"]["relationships"]["item"]["data"]["id"], "urn:item");
    assert_eq!(
        version["data"]["attributes"]["extension"]["type"],
        "versions:autodesk.bim360:File"
    );
}
