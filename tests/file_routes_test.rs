//! File-system route discovery.

mod common;

use std::fs;
use std::path::Path;

use axum::http::StatusCode;
use tempfile::TempDir;

use common::{get, hello, router, send};
use pompom::routing::LoadError;
use pompom::{App, BoxError, Method, ModuleRegistry, Reply, Request, Response, RouteModule};

async fn echo_params(req: Request, res: Response) -> Result<Reply, BoxError> {
    let mut params: Vec<String> = req
        .params()
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    params.sort();
    Ok(res.text(params.join(",")).into())
}

async fn created(_req: Request, res: Response) -> Result<Reply, BoxError> {
    Ok(res.status(201).text("created").into())
}

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "// route file").unwrap();
}

fn routes_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "index.rs");
    touch(dir.path(), "hello.rs");
    touch(dir.path(), "user/[id]/[#name]/[*rest].rs");
    touch(dir.path(), "posts/index.rs");
    touch(dir.path(), "README.md");
    dir
}

fn registry() -> ModuleRegistry {
    ModuleRegistry::new()
        .module("index", RouteModule::new().get(hello))
        .module("hello", RouteModule::new().get(hello))
        .module("user/[id]/[#name]/[*rest]", RouteModule::new().get(echo_params))
        .module("posts/index", RouteModule::new().get(hello).post(created))
}

#[tokio::test]
async fn test_directory_tree_becomes_routes() {
    let dir = routes_tree();
    let mut app = App::new();
    let report = app.load_routes(dir.path(), &registry()).await.unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(
        report.registered,
        vec![
            (Method::Get, "/hello".to_string()),
            (Method::Get, "/".to_string()),
            (Method::Get, "/posts".to_string()),
            (Method::Post, "/posts".to_string()),
            (Method::Get, "/user/:id/:name?/*rest".to_string()),
        ]
    );
    assert!(app.routes().get("/user/:id/:name?/*rest").is_some());
}

#[tokio::test]
async fn test_discovered_routes_serve() {
    let dir = routes_tree();
    let mut app = App::new();
    app.load_routes(dir.path(), &registry()).await.unwrap();
    let router = router(app);

    assert_eq!(get(&router, "/").await.body, "Hello, world!");
    assert_eq!(get(&router, "/hello").await.body, "Hello, world!");
    assert_eq!(send(&router, "POST", "/posts", "").await.status, StatusCode::CREATED);
    assert_eq!(
        get(&router, "/user/7/ann/a/b").await.body,
        "id=7,name=ann,rest=a/b"
    );
    assert_eq!(get(&router, "/user/7/a").await.body, "id=7,rest=a");
}

#[tokio::test]
async fn test_failing_file_does_not_abort_siblings() {
    let dir = routes_tree();
    touch(dir.path(), "broken.rs");

    let mut app = App::new();
    let report = app.load_routes(dir.path(), &registry()).await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("broken.rs"));
    assert!(report.failed[0].1.contains("broken"));
    assert_eq!(report.registered.len(), 5);
}

#[tokio::test]
async fn test_missing_root() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");

    let mut app = App::new();
    let err = app.load_routes(&missing, &registry()).await.unwrap_err();
    assert!(matches!(err, LoadError::MissingRoot(_)));
}

#[tokio::test]
async fn test_custom_extensions() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "hello.route");
    touch(dir.path(), "hello.rs");

    let mut config = pompom::AppConfig::default();
    config.routes.extensions = vec!["route".to_string()];
    let mut app = App::with_config(config);
    let report = app
        .load_routes(dir.path(), &ModuleRegistry::new().module("hello", RouteModule::new().get(hello)))
        .await
        .unwrap();

    assert_eq!(report.registered, vec![(Method::Get, "/hello".to_string())]);
    assert!(report.failed.is_empty());
}
