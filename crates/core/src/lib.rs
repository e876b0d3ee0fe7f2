#![forbid(unsafe_code)]

//! Shared models and wire payloads for the collaboration work-item bridge.

pub mod api;
pub mod error;
pub mod model;
pub mod payload;
pub mod sandbox;
pub mod settings;

mod util;

pub use error::BridgeError;
pub use util::{new_ulid, now_ms};
