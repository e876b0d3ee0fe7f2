//! Request bodies for the storage and job services.
//!
//! Data Management bodies follow JSON:API 1.0; job service bodies follow the
//! v3 REST shapes. All of them are plain `serde_json::Value`s so callers can
//! post them without mirroring the vendor schemas.

use serde_json::{json, Value};

use crate::model::JobSubmission;
use crate::settings::{DaSettings, INPUT_ARGUMENT, OUTPUT_ARGUMENT};

/// Projects of the BIM 360 / ACC family carry a `b.` prefix.
pub fn is_bim360_project(project_id: &str) -> bool {
    project_id.starts_with("b.")
}

fn item_extension(project_id: &str) -> &'static str {
    if is_bim360_project(project_id) {
        "items:autodesk.bim360:File"
    } else {
        "items:autodesk.core:File"
    }
}

fn version_extension(project_id: &str) -> &'static str {
    if is_bim360_project(project_id) {
        "versions:autodesk.bim360:File"
    } else {
        "versions:autodesk.core:File"
    }
}

/// Storage location for a file about to be uploaded into `folder_id`.
pub fn storage_payload(folder_id: &str, name: &str) -> Value {
    json!({
        "jsonapi": { "version": "1.0" },
        "data": {
            "type": "objects",
            "attributes": { "name": name },
            "relationships": {
                "target": {
                    "data": { "type": "folders", "id": folder_id }
                }
            }
        }
    })
}

/// New item with an embedded first version pointing at `storage_id`.
pub fn item_payload(project_id: &str, folder_id: &str, storage_id: &str, name: &str) -> Value {
    json!({
        "jsonapi": { "version": "1.0" },
        "data": {
            "type": "items",
            "attributes": {
                "displayName": name,
                "extension": { "type": item_extension(project_id), "version": "1.0" }
            },
            "relationships": {
                "tip": { "data": { "type": "versions", "id": "1" } },
                "parent": { "data": { "type": "folders", "id": folder_id } }
            }
        },
        "included": [{
            "type": "versions",
            "id": "1",
            "attributes": {
                "name": name,
                "extension": { "type": version_extension(project_id), "version": "1.0" }
            },
            "relationships": {
                "storage": { "data": { "type": "objects", "id": storage_id } }
            }
        }]
    })
}

/// New version of `item_id` pointing at `storage_id`.
pub fn version_payload(project_id: &str, item_id: &str, storage_id: &str, name: &str) -> Value {
    json!({
        "jsonapi": { "version": "1.0" },
        "data": {
            "type": "versions",
            "attributes": {
                "name": name,
                "extension": { "type": version_extension(project_id), "version": "1.0" }
            },
            "relationships": {
                "item": { "data": { "type": "items", "id": item_id } },
                "storage": { "data": { "type": "objects", "id": storage_id } }
            }
        }
    })
}

/// Work item body: `{activityId, arguments: {name: {url, verb, headers}}}`.
pub fn workitem_body(submission: &JobSubmission) -> Value {
    let arguments: serde_json::Map<String, Value> = submission
        .argument_bindings
        .iter()
        .map(|(name, b)| {
            (
                name.clone(),
                json!({
                    "url": b.remote_location,
                    "verb": b.direction.verb(),
                    "headers": { "Authorization": b.auth_header }
                }),
            )
        })
        .collect();

    json!({
        "activityId": submission.activity_reference,
        "arguments": arguments,
    })
}

/// Activity definition. `id` is the unqualified activity name.
pub fn activity_body(settings: &DaSettings, output_name: &str) -> Value {
    json!({
        "id": settings.activity,
        "commandLine": [settings.command_line()],
        "engine": settings.engine,
        "parameters": {
            INPUT_ARGUMENT: { "verb": "get", "required": true },
            OUTPUT_ARGUMENT: { "verb": "put", "localName": output_name, "required": true }
        },
        "settings": {
            "script": { "value": settings.script }
        },
        "appbundles": [settings.bundle_alias()]
    })
}

/// Fields compared to decide whether a remote activity is up to date.
const ACTIVITY_FIELDS: [&str; 5] = ["commandLine", "engine", "parameters", "settings", "appbundles"];

/// True when `existing` matches `desired` on every definition field, ignoring
/// server-assigned ones such as `id` and `version`.
pub fn activity_matches(desired: &Value, existing: &Value) -> bool {
    ACTIVITY_FIELDS
        .iter()
        .all(|field| desired.get(*field) == existing.get(*field))
}

/// App bundle definition. `id` is the unqualified bundle name.
pub fn appbundle_body(settings: &DaSettings) -> Value {
    json!({
        "id": settings.bundle_name,
        "engine": settings.engine,
    })
}

/// Alias pointing `label` at `version`.
pub fn alias_body(label: &str, version: i64) -> Value {
    json!({ "id": label, "version": version })
}
