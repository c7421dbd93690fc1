//! Local HTTP server

pub mod dispatch;
pub mod handlers;
pub mod serve;
pub mod state;
