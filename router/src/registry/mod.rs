//! Project discovery
//!
//! A project is an immediate subdirectory of the projects root that carries the
//! project marker file. Discovery only stats the filesystem, so it is run on
//! every request that needs routing rather than cached.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::RouterError;
use crate::filesys::dir::Dir;

/// Placeholder in the service template replaced by the project name
pub const PROJECT_PLACEHOLDER: &str = "{project}";

/// A deployable project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    /// Project name, the directory name
    pub name: String,

    /// Absolute path of the working tree
    pub path: PathBuf,

    /// Supervisor unit serving this project
    pub service: String,
}

/// Registry options
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Directory whose subdirectories are scanned
    pub base_path: PathBuf,

    /// File that must exist at a project root
    pub project_marker: String,

    /// Directory names never treated as projects
    pub excluded_dirs: Vec<String>,

    /// Service name template
    pub service_template: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/var/www"),
            project_marker: "manage.py".to_string(),
            excluded_dirs: vec!["html".to_string()],
            service_template: format!("gunicorn-{PROJECT_PLACEHOLDER}.service"),
        }
    }
}

/// Maps project names to projects on this host
#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    options: RegistryOptions,
}

impl ProjectRegistry {
    pub fn new(options: RegistryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Service name for a project
    pub fn service_name(&self, project: &str) -> String {
        self.options
            .service_template
            .replace(PROJECT_PLACEHOLDER, project)
    }

    fn is_excluded(&self, name: &str) -> bool {
        name.starts_with('.') || self.options.excluded_dirs.iter().any(|d| d == name)
    }

    /// Scan the projects root. A missing root yields an empty mapping.
    pub async fn discover(&self) -> Result<BTreeMap<String, Project>, RouterError> {
        let base = Dir::new(&self.options.base_path);
        let mut projects = BTreeMap::new();

        if !base.exists().await {
            warn!(
                "Projects root does not exist: {}",
                self.options.base_path.display()
            );
            return Ok(projects);
        }

        for path in base.list_dirs().await? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.is_excluded(name) {
                continue;
            }

            let marker = Dir::new(&path).file(&self.options.project_marker);
            if !marker.exists().await {
                debug!("Skipping {}: no {}", name, self.options.project_marker);
                continue;
            }

            let path = std::path::absolute(&path)?;
            projects.insert(
                name.to_string(),
                Project {
                    name: name.to_string(),
                    path,
                    service: self.service_name(name),
                },
            );
        }

        info!(
            "Discovered {} projects: {:?}",
            projects.len(),
            projects.keys().collect::<Vec<_>>()
        );
        Ok(projects)
    }

    /// Resolve a single project by name
    pub async fn resolve(&self, name: &str) -> Result<Option<Project>, RouterError> {
        Ok(self.discover().await?.remove(name))
    }
}
