//! Inbound request authentication

pub mod signature;
