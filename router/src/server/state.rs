//! Server state

use std::sync::Arc;

use crate::authn::signature::SignatureVerifier;
use crate::deploy::adapters::{ServiceSupervisor, VersionControl};
use crate::registry::ProjectRegistry;
use crate::workers::deployer::Deployer;

/// Server state shared across handlers
pub struct ServerState {
    pub verifier: Arc<SignatureVerifier>,
    pub registry: Arc<ProjectRegistry>,
    pub deployer: Arc<Deployer>,

    /// Used by the status endpoint to report live service and revision state
    pub vcs: Arc<dyn VersionControl>,
    pub supervisor: Arc<dyn ServiceSupervisor>,

    /// Branches whose pushes trigger a deployment
    pub allowed_branches: Vec<String>,
}

impl ServerState {
    pub fn new(
        verifier: Arc<SignatureVerifier>,
        registry: Arc<ProjectRegistry>,
        deployer: Arc<Deployer>,
        vcs: Arc<dyn VersionControl>,
        supervisor: Arc<dyn ServiceSupervisor>,
        allowed_branches: Vec<String>,
    ) -> Self {
        Self {
            verifier,
            registry,
            deployer,
            vcs,
            supervisor,
            allowed_branches,
        }
    }

    pub fn is_branch_allowed(&self, branch: &str) -> bool {
        self.allowed_branches.iter().any(|b| b == branch)
    }
}
