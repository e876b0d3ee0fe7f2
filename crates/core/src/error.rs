use thiserror::Error;

use crate::model::WorkItemState;

/// Failures shared by the request path and the work item monitor.
///
/// The display text of every variant is user facing: the monitor forwards it
/// verbatim to the browser log when a job fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// Token issuance or refresh failed.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Malformed client input.
    #[error("{0}")]
    BadRequest(String),
    /// No valid user session.
    #[error("unauthorized")]
    Unauthorized,
    /// The remote job ended in a state other than success.
    #[error("work item {id} finished with status {state}")]
    RemoteJob {
        /// Work item id.
        id: String,
        /// Terminal state reported by the service.
        state: WorkItemState,
    },
    /// Listing, creating or updating a destination version failed.
    #[error("reconciliation failed: {0}")]
    Reconciliation(String),
    /// Network or HTTP level failure on a remote call.
    #[error("{0}")]
    Transport(String),
    /// Nickname, app bundle or activity provisioning failed.
    #[error("setup failed: {0}")]
    Setup(String),
}

impl BridgeError {
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    pub fn auth<E: std::fmt::Display>(e: E) -> Self {
        Self::Auth(e.to_string())
    }

    pub fn reconciliation<E: std::fmt::Display>(e: E) -> Self {
        Self::Reconciliation(e.to_string())
    }

    pub fn setup<E: std::fmt::Display>(e: E) -> Self {
        Self::Setup(e.to_string())
    }
}
