//! File-system route discovery.
//!
//! # Responsibilities
//! - Walk a routes directory recursively
//! - Translate bracket names into path segments (`[id]` → `:id`,
//!   `[#name]` → `:name?`, `[*rest]` → `*rest`, `index` → parent path)
//! - Resolve each route file to handlers through an injected [`ModuleLoader`]
//! - Register discovered handlers into the route table
//!
//! # Design Decisions
//! - Handler code is compiled in; the loader maps a discovered file to it
//! - One bad file never aborts discovery of its siblings (logged, reported)
//! - Entries are visited in sorted order for reproducible registration

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::http::handler::{BoxError, BoxHandler, Handler};
use crate::http::method::Method;
use crate::routing::table::RouteTable;

/// Errors that abort discovery as a whole.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Routes directory \"{0}\" does not exist")]
    MissingRoot(PathBuf),

    #[error("Failed to read routes directory \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Returned by [`ModuleRegistry`] for files it has no module for.
    #[error("No route module registered for \"{0}\"")]
    ModuleNotFound(String),
}

/// A discovered route file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFile {
    /// Location on disk.
    pub path: PathBuf,
    /// Path relative to the routes root, `/`-separated, without extension
    /// (e.g. `user/[id]`).
    pub key: String,
    /// Route path composed from the directory and file names.
    pub route: String,
}

/// Handlers exported by one route file.
#[derive(Clone, Default)]
pub struct RouteModule {
    pub get: Option<BoxHandler>,
    pub post: Option<BoxHandler>,
    pub put: Option<BoxHandler>,
    pub delete: Option<BoxHandler>,
    pub patch: Option<BoxHandler>,
}

impl RouteModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<H: Handler>(mut self, handler: H) -> Self {
        self.get = Some(Arc::new(handler));
        self
    }

    pub fn post<H: Handler>(mut self, handler: H) -> Self {
        self.post = Some(Arc::new(handler));
        self
    }

    pub fn put<H: Handler>(mut self, handler: H) -> Self {
        self.put = Some(Arc::new(handler));
        self
    }

    pub fn delete<H: Handler>(mut self, handler: H) -> Self {
        self.delete = Some(Arc::new(handler));
        self
    }

    pub fn patch<H: Handler>(mut self, handler: H) -> Self {
        self.patch = Some(Arc::new(handler));
        self
    }

    /// Present handlers, in export order.
    pub fn exports(&self) -> Vec<(Method, BoxHandler)> {
        [
            (Method::Get, &self.get),
            (Method::Post, &self.post),
            (Method::Put, &self.put),
            (Method::Delete, &self.delete),
            (Method::Patch, &self.patch),
        ]
        .into_iter()
        .filter_map(|(method, handler)| handler.clone().map(|h| (method, h)))
        .collect()
    }
}

impl std::fmt::Debug for RouteModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let methods: Vec<Method> = self.exports().into_iter().map(|(m, _)| m).collect();
        f.debug_tuple("RouteModule").field(&methods).finish()
    }
}

/// Resolves a discovered file to its handlers.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, file: &RouteFile) -> Result<RouteModule, BoxError>;
}

/// A [`ModuleLoader`] backed by modules registered up front, keyed by
/// [`RouteFile::key`].
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, RouteModule>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(mut self, key: impl Into<String>, module: RouteModule) -> Self {
        self.modules.insert(key.into(), module);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load(&self, file: &RouteFile) -> Result<RouteModule, BoxError> {
        self.modules
            .get(&file.key)
            .cloned()
            .ok_or_else(|| LoadError::ModuleNotFound(file.key.clone()).into())
    }
}

/// Summary of one discovery pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Registered `(method, route)` pairs.
    pub registered: Vec<(Method, String)>,
    /// Files that failed, with the error message.
    pub failed: Vec<(PathBuf, String)>,
}

/// Translate a file or directory name into a route segment.
pub fn to_route_segment(name: &str) -> String {
    if name == "index" {
        return "/".to_string();
    }

    let mut out = String::from("/");
    let mut rest = name;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];
        match candidate.find(']').and_then(|close| {
            translate_bracket(&candidate[1..close]).map(|segment| (segment, close))
        }) {
            Some((segment, close)) => {
                out.push_str(&segment);
                rest = &candidate[close + 1..];
            }
            None => {
                out.push('[');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn translate_bracket(inner: &str) -> Option<String> {
    let valid = |name: &str| {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    if let Some(name) = inner.strip_prefix('#') {
        valid(name).then(|| format!(":{}?", name))
    } else if let Some(name) = inner.strip_prefix('*') {
        valid(name).then(|| format!("*{}", name))
    } else {
        valid(inner).then(|| format!(":{}", inner))
    }
}

/// Walk `root` and register every route file into `table`.
pub async fn register_routes<L>(
    table: &mut RouteTable,
    root: &Path,
    extensions: &[String],
    loader: &L,
) -> Result<LoadReport, LoadError>
where
    L: ModuleLoader + ?Sized,
{
    if !tokio::fs::try_exists(root).await.unwrap_or(false) {
        return Err(LoadError::MissingRoot(root.to_path_buf()));
    }

    let mut report = LoadReport::default();
    // (directory, route prefix, key prefix)
    let mut pending = vec![(root.to_path_buf(), String::new(), String::new())];
    let mut is_root = true;

    while let Some((dir, base_route, base_key)) = pending.pop() {
        let entries = match read_sorted(&dir).await {
            Ok(entries) => entries,
            Err(source) if is_root => {
                return Err(LoadError::Io { path: dir, source });
            }
            Err(e) => {
                tracing::error!(path = %dir.display(), error = %e, "Failed to read route directory");
                report.failed.push((dir, e.to_string()));
                continue;
            }
        };
        is_root = false;

        let mut subdirs = Vec::new();
        for (name, path, is_dir) in entries {
            if is_dir {
                subdirs.push((
                    path,
                    format!("{}{}", base_route, to_route_segment(&name)),
                    join_key(&base_key, &name),
                ));
                continue;
            }

            let Some((stem, extension)) = name.rsplit_once('.') else {
                continue;
            };
            if !extensions.iter().any(|ext| ext == extension) {
                tracing::debug!(path = %path.display(), "Skipping non-route file");
                continue;
            }

            let file = RouteFile {
                route: format!("{}{}", base_route, to_route_segment(stem)),
                key: join_key(&base_key, stem),
                path,
            };
            register_file(table, loader, &file, &mut report);
        }

        // Reversed so the stack pops them in sorted order.
        pending.extend(subdirs.into_iter().rev());
    }

    tracing::info!(
        registered = report.registered.len(),
        failed = report.failed.len(),
        root = %root.display(),
        "Route discovery finished"
    );
    Ok(report)
}

fn register_file<L>(table: &mut RouteTable, loader: &L, file: &RouteFile, report: &mut LoadReport)
where
    L: ModuleLoader + ?Sized,
{
    let module = match loader.load(file) {
        Ok(module) => module,
        Err(e) => {
            tracing::error!(
                route = %file.route,
                file = %file.path.display(),
                error = %e,
                "Error registering route"
            );
            report.failed.push((file.path.clone(), e.to_string()));
            return;
        }
    };

    for (method, handler) in module.exports() {
        match table.register(&file.route, method, handler) {
            Ok(entry) => {
                tracing::info!(method = %method, route = %entry.path(), "Registered file route");
                report.registered.push((method, entry.path().to_string()));
            }
            Err(e) => {
                tracing::error!(
                    route = %file.route,
                    file = %file.path.display(),
                    error = %e,
                    "Error registering route"
                );
                report.failed.push((file.path.clone(), e.to_string()));
                return;
            }
        }
    }
}

fn join_key(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

/// Directory entries as `(name, path, is_dir)`, sorted by name.
async fn read_sorted(dir: &Path) -> std::io::Result<Vec<(String, PathBuf, bool)>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
            continue;
        };
        let is_dir = match entry.file_type().await {
            Ok(kind) => kind.is_dir(),
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to stat entry");
                continue;
            }
        };
        entries.push((name, entry.path(), is_dir));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
