//! Request and deployment models

pub mod deployment;
pub mod push;
