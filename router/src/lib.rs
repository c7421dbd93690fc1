//! Webhook router library
//!
//! Receives signed push notifications, maps them to projects on this host and
//! deploys them in the background with rollback on failure.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod notify;
pub mod registry;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
