//! Path pattern compilation.
//!
//! # Responsibilities
//! - Parse route path strings (`/user/:id/:name?/*rest`) into typed segments
//! - Split off the query declaration suffix (`/user/:id?name&age`)
//! - Render patterns for display and for the radix-tree matcher
//!
//! # Design Decisions
//! - Pure and deterministic: same input always compiles to the same pattern
//! - Empty components are discarded, so leading/trailing slashes are insignificant
//! - Optional segments are expanded into several matcher paths at snapshot time,
//!   grouped by how many segments each one leaves out

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// Upper bound on optional segments; each one doubles the matcher paths.
pub const MAX_OPTIONAL_SEGMENTS: usize = 8;

/// Errors produced while compiling a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A `:` or `*` marker without a name.
    #[error("Empty parameter name in segment \"{0}\"")]
    EmptyName(String),

    /// A name containing characters reserved by the matcher.
    #[error("Invalid parameter name \"{0}\"")]
    InvalidName(String),

    /// A catch-all that is followed by more segments.
    #[error("Wildcard \"*{0}\" must be the last segment")]
    WildcardNotLast(String),

    /// The same parameter bound twice.
    #[error("Duplicate parameter name \"{0}\"")]
    DuplicateName(String),

    #[error("Too many optional segments ({0}), at most {MAX_OPTIONAL_SEGMENTS} are supported")]
    TooManyOptional(usize),
}

/// One component of a compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Must match exactly.
    Literal(String),
    /// Matches exactly one path component.
    Required(String),
    /// Matches zero or one path component.
    Optional(String),
    /// Matches the remainder of the path as a single value.
    Wildcard(String),
}

impl Segment {
    /// Parameter name bound by this segment, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Segment::Literal(_) => None,
            Segment::Required(name) | Segment::Optional(name) | Segment::Wildcard(name) => {
                Some(name)
            }
        }
    }

    fn parse(raw: &str) -> Result<Self, PatternError> {
        if let Some(rest) = raw.strip_prefix(':') {
            let (name, optional) = match rest.strip_suffix('?') {
                Some(name) => (name, true),
                None => (rest, false),
            };
            let name = validate_name(raw, name)?;
            Ok(if optional {
                Segment::Optional(name)
            } else {
                Segment::Required(name)
            })
        } else if let Some(name) = raw.strip_prefix('*') {
            Ok(Segment::Wildcard(validate_name(raw, name)?))
        } else {
            Ok(Segment::Literal(raw.to_string()))
        }
    }
}

fn validate_name(raw: &str, name: &str) -> Result<String, PatternError> {
    if name.is_empty() {
        return Err(PatternError::EmptyName(raw.to_string()));
    }
    if name.contains(['{', '}', ':', '*', '?']) {
        return Err(PatternError::InvalidName(name.to_string()));
    }
    Ok(name.to_string())
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(text) => write!(f, "{}", text),
            Segment::Required(name) => write!(f, ":{}", name),
            Segment::Optional(name) => write!(f, ":{}?", name),
            Segment::Wildcard(name) => write!(f, "*{}", name),
        }
    }
}

/// A compiled route path.
///
/// Immutable once built. The [`Display`](fmt::Display) form is the canonical key
/// used by the route table: a leading `/`, no trailing slash, root as `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a path string.
    pub fn parse(path: &str) -> Result<Self, PatternError> {
        let segments = path
            .split('/')
            .filter(|component| !component.is_empty())
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        for (index, segment) in segments.iter().enumerate() {
            if let Segment::Wildcard(name) = segment {
                if index + 1 != segments.len() {
                    return Err(PatternError::WildcardNotLast(name.clone()));
                }
            }
            if let Some(name) = segment.name() {
                if !seen.insert(name) {
                    return Err(PatternError::DuplicateName(name.to_string()));
                }
            }
        }

        let optional = segments
            .iter()
            .filter(|s| matches!(s, Segment::Optional(_)))
            .count();
        if optional > MAX_OPTIONAL_SEGMENTS {
            return Err(PatternError::TooManyOptional(optional));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of all parameters, in path order.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments.iter().filter_map(Segment::name).collect()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render the paths handed to the radix-tree matcher, each paired with
    /// the number of optional segments it leaves out.
    ///
    /// Every present/absent combination of optional segments yields one path.
    /// Paths are ordered by elided count; within one count, forms that keep
    /// earlier optional segments come first. The first path always has every
    /// optional segment present.
    pub fn matcher_paths(&self) -> Vec<(usize, String)> {
        let optional: Vec<usize> = self
            .segments
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Segment::Optional(_)))
            .map(|(i, _)| i)
            .collect();

        let mut masks: Vec<u32> = (0..1u32 << optional.len()).collect();
        masks.sort_by_key(|mask| (mask.count_ones(), std::cmp::Reverse(*mask)));

        masks
            .into_iter()
            .map(|absent_mask| {
                let mut path = String::new();
                for (index, segment) in self.segments.iter().enumerate() {
                    if let Some(bit) = optional.iter().position(|&i| i == index) {
                        if absent_mask & (1 << bit) != 0 {
                            continue;
                        }
                    }
                    path.push('/');
                    match segment {
                        Segment::Literal(text) => {
                            path.push_str(&text.replace('{', "{{").replace('}', "}}"))
                        }
                        Segment::Required(name) | Segment::Optional(name) => {
                            path.push('{');
                            path.push_str(name);
                            path.push('}');
                        }
                        Segment::Wildcard(name) => {
                            path.push_str("{*");
                            path.push_str(name);
                            path.push('}');
                        }
                    }
                }
                if path.is_empty() {
                    path.push('/');
                }
                (absent_mask.count_ones() as usize, path)
            })
            .collect()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// Strip one trailing slash, except for the bare root.
pub fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Separate a query declaration suffix from a route path.
///
/// The suffix starts at the first `?` that is not directly followed by `/`,
/// another `?` or the end of the string; those are optional-segment markers.
/// Declared names are returned in order, empty names dropped.
pub fn split_query_declaration(path: &str) -> (&str, Vec<String>) {
    let bytes = path.as_bytes();
    let start = bytes.iter().enumerate().position(|(i, &b)| {
        b == b'?' && !matches!(bytes.get(i + 1), None | Some(b'/') | Some(b'?'))
    });

    match start {
        Some(index) => {
            let names = path[index + 1..]
                .split('&')
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            (&path[..index], names)
        }
        None => (path, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segment_kinds() {
        let pattern = PathPattern::parse("/user/:id/:name?/*rest").unwrap();
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("user".into()),
                Segment::Required("id".into()),
                Segment::Optional("name".into()),
                Segment::Wildcard("rest".into()),
            ]
        );
        assert_eq!(pattern.param_names(), vec!["id", "name", "rest"]);
        assert_eq!(pattern.to_string(), "/user/:id/:name?/*rest");
    }

    #[test]
    fn test_slashes_are_insignificant() {
        let a = PathPattern::parse("/hello/").unwrap();
        let b = PathPattern::parse("hello").unwrap();
        let c = PathPattern::parse("//hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.to_string(), "/hello");
    }

    #[test]
    fn test_root() {
        let root = PathPattern::parse("/").unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "/");
        assert_eq!(root.matcher_paths(), vec![(0, "/".to_string())]);
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(
            PathPattern::parse("/files/*rest/more"),
            Err(PatternError::WildcardNotLast("rest".into()))
        );
        assert_eq!(
            PathPattern::parse("/a/:id/b/:id"),
            Err(PatternError::DuplicateName("id".into()))
        );
        assert_eq!(
            PathPattern::parse("/a/:"),
            Err(PatternError::EmptyName(":".into()))
        );
        assert!(matches!(
            PathPattern::parse("/a/:na{me"),
            Err(PatternError::InvalidName(_))
        ));
    }

    #[test]
    fn test_matcher_paths_expand_optional() {
        let pattern = PathPattern::parse("/user/:id/:tab?").unwrap();
        assert_eq!(
            pattern.matcher_paths(),
            vec![
                (0, "/user/{id}/{tab}".to_string()),
                (1, "/user/{id}".to_string()),
            ]
        );

        let pattern = PathPattern::parse("/files/*path").unwrap();
        assert_eq!(pattern.matcher_paths(), vec![(0, "/files/{*path}".to_string())]);
    }

    #[test]
    fn test_matcher_paths_prefer_earlier_optional() {
        let pattern = PathPattern::parse("/:a?/:b?").unwrap();
        assert_eq!(
            pattern.matcher_paths(),
            vec![
                (0, "/{a}/{b}".to_string()),
                (1, "/{a}".to_string()),
                (1, "/{b}".to_string()),
                (2, "/".to_string()),
            ]
        );
    }

    #[test]
    fn test_matcher_paths_escape_braces() {
        let pattern = PathPattern::parse("/raw/{x}").unwrap();
        assert_eq!(pattern.matcher_paths(), vec![(0, "/raw/{{x}}".to_string())]);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/hello/"), "/hello");
        assert_eq!(normalize_path("/hello"), "/hello");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_split_query_declaration() {
        assert_eq!(
            split_query_declaration("/user/:id?name&age&gender"),
            ("/user/:id", vec!["name".into(), "age".into(), "gender".into()])
        );
        assert_eq!(split_query_declaration("/user/:id?"), ("/user/:id?", vec![]));
        assert_eq!(
            split_query_declaration("/user/:id?/posts"),
            ("/user/:id?/posts", vec![])
        );
        assert_eq!(
            split_query_declaration("/user/:id??sort"),
            ("/user/:id?", vec!["sort".into()])
        );
        assert_eq!(split_query_declaration("/plain"), ("/plain", vec![]));
    }
}
