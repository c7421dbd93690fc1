//! Project registry tests

use std::fs;
use std::path::Path;

use hookrouter::registry::{ProjectRegistry, RegistryOptions};
use tempfile::TempDir;

fn registry(root: &Path) -> ProjectRegistry {
    ProjectRegistry::new(RegistryOptions {
        base_path: root.to_path_buf(),
        ..Default::default()
    })
}

fn make_project(root: &Path, name: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("manage.py"), "").unwrap();
}

#[tokio::test]
async fn test_discover_requires_marker_file() {
    let root = TempDir::new().unwrap();
    make_project(root.path(), "site-a");
    make_project(root.path(), "site-b");
    fs::create_dir_all(root.path().join("not-a-project")).unwrap();
    fs::write(root.path().join("stray-file"), "").unwrap();

    let projects = registry(root.path()).discover().await.unwrap();
    assert_eq!(
        projects.keys().collect::<Vec<_>>(),
        vec!["site-a", "site-b"]
    );

    let site_a = &projects["site-a"];
    assert_eq!(site_a.name, "site-a");
    assert_eq!(site_a.service, "gunicorn-site-a.service");
    assert!(site_a.path.is_absolute());
    assert!(site_a.path.ends_with("site-a"));
}

#[tokio::test]
async fn test_discover_skips_denylisted_entries() {
    let root = TempDir::new().unwrap();
    make_project(root.path(), "html");
    make_project(root.path(), ".hidden");
    make_project(root.path(), "site-a");

    let projects = registry(root.path()).discover().await.unwrap();
    assert_eq!(projects.keys().collect::<Vec<_>>(), vec!["site-a"]);
}

#[tokio::test]
async fn test_marker_directory_does_not_qualify() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("odd").join("manage.py")).unwrap();

    let projects = registry(root.path()).discover().await.unwrap();
    assert!(projects.is_empty());
}

#[tokio::test]
async fn test_discover_is_idempotent() {
    let root = TempDir::new().unwrap();
    make_project(root.path(), "site-a");
    let registry = registry(root.path());

    let first = registry.discover().await.unwrap();
    let second = registry.discover().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_discover_sees_new_projects_without_restart() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    assert!(registry.resolve("site-a").await.unwrap().is_none());

    make_project(root.path(), "site-a");
    let project = registry.resolve("site-a").await.unwrap().unwrap();
    assert_eq!(project.service, "gunicorn-site-a.service");
}

#[tokio::test]
async fn test_missing_root_yields_no_projects() {
    let root = TempDir::new().unwrap();
    let projects = registry(&root.path().join("missing"))
        .discover()
        .await
        .unwrap();
    assert!(projects.is_empty());
}
