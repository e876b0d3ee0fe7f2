#![forbid(unsafe_code)]

//! Collaboration work-item bridge: HTTP and WebSocket front end, platform
//! REST clients and the detached work item monitor.

pub mod aps;
pub mod auth;
pub mod config;
pub mod da;
pub mod dm;
pub mod error;
pub mod http;
pub mod hub;
pub mod monitor;
pub mod oss;
pub mod reconcile;
pub mod report;
pub mod service;
pub mod session;
