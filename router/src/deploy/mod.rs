//! Deployment module

pub mod adapters;
pub mod executor;
pub mod fsm;
pub mod git;
pub mod marker;
pub mod rollback;
pub mod script;
pub mod systemd;
