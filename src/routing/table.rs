//! Route table and frozen route snapshot.
//!
//! # Responsibilities
//! - Store registered routes keyed by their normalized pattern
//! - Merge per-method handlers when a path is registered again
//! - Freeze into a radix-tree snapshot for lookups while serving
//! - Resolve request paths to an entry plus bound parameters
//!
//! # Design Decisions
//! - Registration order is preserved (deterministic build logs)
//! - `snapshot()` consumes the table: no registration after serving starts
//! - Conflicts between full patterns are errors; conflicting elided optional
//!   forms are skipped with a warning
//! - Elided forms live in their own matcher tiers, so they never collide
//!   with full patterns and registration order does not matter

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::http::handler::{BoxHandler, Handlers};
use crate::http::method::Method;
use crate::http::request::percent_decode;
use crate::routing::pattern::{normalize_path, split_query_declaration, PathPattern, PatternError};

/// Errors raised while building the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Invalid route \"{path}\": {source}")]
    Pattern {
        path: String,
        #[source]
        source: PatternError,
    },

    #[error("Route \"{path}\" conflicts with an existing route: {source}")]
    Conflict {
        path: String,
        #[source]
        source: matchit::InsertError,
    },
}

/// One normalized path and its method handlers.
#[derive(Clone)]
pub struct RouteEntry {
    key: String,
    pattern: PathPattern,
    handlers: BTreeMap<Method, BoxHandler>,
    declared_query: Vec<String>,
}

impl RouteEntry {
    /// Normalized path this entry is keyed by.
    pub fn path(&self) -> &str {
        &self.key
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self, method: Method) -> Option<&BoxHandler> {
        self.handlers.get(&method)
    }

    /// Registered methods, in [`Method`] order.
    pub fn methods(&self) -> Vec<Method> {
        self.handlers.keys().copied().collect()
    }

    /// Query parameter names declared in the route path.
    pub fn declared_query(&self) -> &[String] {
        &self.declared_query
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("path", &self.key)
            .field("methods", &self.methods())
            .field("declared_query", &self.declared_query)
            .finish()
    }
}

/// Mutable route table, written during setup only.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one handler. Re-registering a (path, method) pair replaces it;
    /// other methods on the same path are kept.
    pub fn register(&mut self, path: &str, method: Method, handler: BoxHandler) -> Result<&RouteEntry, RouteError> {
        let mut handlers = Handlers::new();
        handlers.insert_boxed(method, handler);
        self.register_all(path, handlers)
    }

    /// Register a set of handlers, merging into any existing entry.
    pub fn register_all(&mut self, path: &str, handlers: Handlers) -> Result<&RouteEntry, RouteError> {
        let (route_path, declared) = split_query_declaration(path);
        let normalized = normalize_path(route_path);
        let pattern = PathPattern::parse(normalized).map_err(|source| RouteError::Pattern {
            path: path.to_string(),
            source,
        })?;
        let key = pattern.to_string();

        let position = match self.index.get(&key) {
            Some(&position) => {
                let entry = &mut self.entries[position];
                entry.handlers.extend(handlers.into_inner());
                for name in declared {
                    if !entry.declared_query.contains(&name) {
                        entry.declared_query.push(name);
                    }
                }
                position
            }
            None => {
                let position = self.entries.len();
                self.entries.push(RouteEntry {
                    key: key.clone(),
                    pattern,
                    handlers: handlers.into_inner(),
                    declared_query: declared,
                });
                self.index.insert(key, position);
                position
            }
        };

        Ok(&self.entries[position])
    }

    /// Exact lookup by route path (normalized the same way as `register`).
    pub fn get(&self, path: &str) -> Option<&RouteEntry> {
        let (route_path, _) = split_query_declaration(path);
        let key = PathPattern::parse(normalize_path(route_path)).ok()?.to_string();
        self.index.get(&key).map(|&position| &self.entries[position])
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the table into a read-only snapshot.
    ///
    /// Full forms go into the first matcher tier and must not conflict.
    /// Forms with `n` optional segments left out go into tier `n`; a conflict
    /// there only drops that form.
    pub fn snapshot(self) -> Result<RouteSnapshot, RouteError> {
        let mut tiers = vec![matchit::Router::new()];
        let mut elided_forms = Vec::new();

        for (position, entry) in self.entries.iter().enumerate() {
            let mut paths = entry.pattern.matcher_paths().into_iter();

            if let Some((_, full)) = paths.next() {
                tiers[0]
                    .insert(full, position)
                    .map_err(|source| RouteError::Conflict {
                        path: entry.key.clone(),
                        source,
                    })?;
            }
            elided_forms.extend(paths.map(|(elided, path)| (position, elided, path)));

            let methods: Vec<&str> = entry.handlers.keys().map(Method::as_str).collect();
            tracing::info!(
                methods = %methods.join(" "),
                path = %entry.key,
                "Built route"
            );
        }

        for (position, elided, path) in elided_forms {
            if tiers.len() <= elided {
                tiers.resize_with(elided + 1, matchit::Router::new);
            }
            if let Err(e) = tiers[elided].insert(path.clone(), position) {
                tracing::warn!(
                    route = %self.entries[position].key,
                    path = %path,
                    error = %e,
                    "Skipping optional route form"
                );
            }
        }

        Ok(RouteSnapshot {
            entries: self.entries,
            tiers,
        })
    }
}

/// A resolved request path.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: HashMap<String, String>,
}

/// Immutable route set used while serving.
pub struct RouteSnapshot {
    entries: Vec<RouteEntry>,
    /// Matchers by number of optional segments left out, tried in order.
    tiers: Vec<matchit::Router<usize>>,
}

impl RouteSnapshot {
    /// Match a request path.
    ///
    /// One trailing slash is ignored, mirroring registration. A path given
    /// explicitly always wins over one that leaves optional segments out.
    /// Parameter values are percent-decoded, falling back to the raw text if
    /// that fails.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        let path = match normalize_path(path) {
            "" => "/",
            other => other,
        };
        let matched = self.tiers.iter().find_map(|tier| tier.at(path).ok())?;
        let params = matched
            .params
            .iter()
            .map(|(name, raw)| {
                let value = percent_decode(raw).unwrap_or_else(|| raw.to_string());
                (name.to_string(), value)
            })
            .collect();

        Some(RouteMatch {
            entry: &self.entries[*matched.value],
            params,
        })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for RouteSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(RouteEntry::path)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::{BoxError, Reply};
    use crate::http::request::Request;
    use crate::http::response::Response;
    use std::sync::Arc;

    async fn noop(_req: Request, res: Response) -> Result<Reply, BoxError> {
        Ok(res.into())
    }

    fn handler() -> BoxHandler {
        Arc::new(noop)
    }

    #[test]
    fn test_register_normalizes_trailing_slash() {
        let mut table = RouteTable::new();
        table.register("/hello/", Method::Get, handler()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.entries()[0].path(), "/hello");
        assert!(table.get("/hello").is_some());
        assert!(table.get("/hello/").is_some());
    }

    #[test]
    fn test_register_merges_methods() {
        let mut table = RouteTable::new();
        table.register("/items", Method::Get, handler()).unwrap();
        table.register("/items/", Method::Post, handler()).unwrap();
        table
            .register_all("/items", Handlers::new().get(noop).delete(noop))
            .unwrap();

        assert_eq!(table.len(), 1);
        let entry = table.get("/items").unwrap();
        assert_eq!(entry.methods(), vec![Method::Get, Method::Post, Method::Delete]);
    }

    #[test]
    fn test_query_declaration_is_stripped() {
        let mut table = RouteTable::new();
        let entry = table
            .register("/user/:id?name&age", Method::Get, handler())
            .unwrap();
        assert_eq!(entry.path(), "/user/:id");
        assert_eq!(entry.declared_query(), &["name".to_string(), "age".to_string()]);

        table
            .register("/user/:id?gender&age", Method::Post, handler())
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get("/user/:id").unwrap().declared_query(),
            &["name".to_string(), "age".to_string(), "gender".to_string()]
        );
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut table = RouteTable::new();
        let err = table
            .register("/files/*rest/tail", Method::Get, handler())
            .unwrap_err();
        assert!(matches!(err, RouteError::Pattern { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn test_snapshot_resolves_params() {
        let mut table = RouteTable::new();
        table.register("/", Method::Get, handler()).unwrap();
        table.register("/user/:id", Method::Get, handler()).unwrap();
        table.register("/files/*path", Method::Get, handler()).unwrap();
        let snapshot = table.snapshot().unwrap();

        assert_eq!(snapshot.resolve("/").unwrap().entry.path(), "/");

        let m = snapshot.resolve("/user/J%C3%B6rg").unwrap();
        assert_eq!(m.entry.path(), "/user/:id");
        assert_eq!(m.params["id"], "Jörg");

        let m = snapshot.resolve("/user/42/").unwrap();
        assert_eq!(m.params["id"], "42");

        let m = snapshot.resolve("/files/a/b/c.txt").unwrap();
        assert_eq!(m.params["path"], "a/b/c.txt");

        assert!(snapshot.resolve("/nope").is_none());
        assert!(snapshot.resolve("/user/1/2").is_none());
    }

    #[test]
    fn test_snapshot_optional_segment() {
        let mut table = RouteTable::new();
        table.register("/post/:slug/:page?", Method::Get, handler()).unwrap();
        let snapshot = table.snapshot().unwrap();

        let m = snapshot.resolve("/post/hello").unwrap();
        assert_eq!(m.entry.path(), "/post/:slug/:page?");
        assert_eq!(m.params.len(), 1);

        let m = snapshot.resolve("/post/hello/2").unwrap();
        assert_eq!(m.params["page"], "2");
    }

    #[test]
    fn test_snapshot_static_beats_param() {
        let mut table = RouteTable::new();
        table.register("/user/:id", Method::Get, handler()).unwrap();
        table.register("/user/me", Method::Post, handler()).unwrap();
        let snapshot = table.snapshot().unwrap();

        assert_eq!(snapshot.resolve("/user/me").unwrap().entry.path(), "/user/me");
        assert_eq!(snapshot.resolve("/user/7").unwrap().entry.path(), "/user/:id");
    }

    #[test]
    fn test_snapshot_conflict() {
        let mut table = RouteTable::new();
        table.register("/user/:id", Method::Get, handler()).unwrap();
        table.register("/user/:name", Method::Post, handler()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(matches!(table.snapshot(), Err(RouteError::Conflict { .. })));
    }

    #[test]
    fn test_optional_before_wildcard() {
        let mut table = RouteTable::new();
        table
            .register("/user/:id/:name?/*rest", Method::Get, handler())
            .unwrap();
        let snapshot = table.snapshot().unwrap();

        let m = snapshot.resolve("/user/7/ann/a").unwrap();
        assert_eq!(m.params["id"], "7");
        assert_eq!(m.params["name"], "ann");
        assert_eq!(m.params["rest"], "a");

        let m = snapshot.resolve("/user/7/a").unwrap();
        assert_eq!(m.entry.path(), "/user/:id/:name?/*rest");
        assert_eq!(m.params.len(), 2);
        assert_eq!(m.params["id"], "7");
        assert_eq!(m.params["rest"], "a");

        assert!(snapshot.resolve("/user/7").is_none());
    }

    #[test]
    fn test_explicit_path_beats_elided_form_in_any_order() {
        for optional_first in [false, true] {
            let mut table = RouteTable::new();
            if optional_first {
                table.register("/posts/:page?", Method::Get, handler()).unwrap();
                table.register("/posts", Method::Post, handler()).unwrap();
            } else {
                table.register("/posts", Method::Post, handler()).unwrap();
                table.register("/posts/:page?", Method::Get, handler()).unwrap();
            }
            let snapshot = table.snapshot().unwrap();

            let m = snapshot.resolve("/posts").unwrap();
            assert_eq!(m.entry.path(), "/posts");
            assert!(m.params.is_empty());

            let m = snapshot.resolve("/posts/2").unwrap();
            assert_eq!(m.entry.path(), "/posts/:page?");
            assert_eq!(m.params["page"], "2");
        }
    }

    #[test]
    fn test_conflicting_elided_forms_keep_first() {
        let mut table = RouteTable::new();
        table.register("/a/:x?", Method::Get, handler()).unwrap();
        table.register("/b/:y?", Method::Get, handler()).unwrap();
        table.register("/:lang?/a", Method::Get, handler()).unwrap();
        let snapshot = table.snapshot().unwrap();

        // `/a` is produced by both `/a/:x?` and `/:lang?/a`.
        assert_eq!(snapshot.resolve("/a").unwrap().entry.path(), "/a/:x?");
        assert_eq!(snapshot.resolve("/b").unwrap().entry.path(), "/b/:y?");
        assert_eq!(snapshot.resolve("/en/a").unwrap().entry.path(), "/:lang?/a");
    }
}
