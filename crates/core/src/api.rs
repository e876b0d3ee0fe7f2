use serde::{Deserialize, Serialize};

use crate::BridgeError;

/// Form posted by the browser to start a work item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartWorkitemForm {
    #[serde(default)]
    pub data: Option<String>,
}

/// JSON carried in the `data` form field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkitemData {
    #[serde(default)]
    pub hub_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub browser_connection_id: Option<String>,
}

/// Validated work item request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkitemRequest {
    pub hub_id: String,
    pub project_id: String,
    pub folder_id: String,
    pub browser_connection_id: String,
}

/// Parses and validates the raw `data` field.
pub fn parse_workitem_data(raw: Option<&str>) -> Result<WorkitemRequest, BridgeError> {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Err(BridgeError::BadRequest("Missing Data".into())),
    };

    let data: Option<WorkitemData> = serde_json::from_str(raw)
        .map_err(|_| BridgeError::BadRequest("Invalid JSON format".into()))?;
    let Some(data) = data else {
        return Err(BridgeError::BadRequest("Invalid JSON format".into()));
    };

    Ok(WorkitemRequest {
        hub_id: data.hub_id.unwrap_or_default(),
        project_id: required(data.project_id, "projectId")?,
        folder_id: required(data.folder_id, "folderId")?,
        browser_connection_id: required(data.browser_connection_id, "browserConnectionId")?,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, BridgeError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(BridgeError::BadRequest(format!("Missing {field}"))),
    }
}

/// Response of a started work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartWorkitemResponse {
    #[serde(rename = "WorkItemId")]
    pub work_item_id: String,
}

/// Error body for 4xx/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
}

/// Public viewer token handed to the browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Minimal user profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
}

/// Query of the folder contents listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentsQuery {
    #[serde(default)]
    pub folder_id: Option<String>,
}

/// Query of the OAuth callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
}
