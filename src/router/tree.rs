//! Per-method segment tree.
//!
//! Each node holds literal children keyed by segment text, at most one named
//! child (`:id`) and at most one wildcard (`*rest`). Lookup tries literal,
//! then named, then wildcard at every depth and backtracks out of dead ends,
//! so `/users/me/settings` still reaches `/users/:id/settings` when the
//! literal `me` branch has no `settings` child.

use std::collections::HashMap;

use crate::error::{Error, Result};

pub(crate) type RouteId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Literal(&'a str),
    Named(&'a str),
    Wildcard(&'a str),
}

/// Splits a route pattern into segments. Empty segments (leading, trailing
/// or doubled slashes) are dropped.
pub(crate) fn parse_pattern(pattern: &str) -> Result<Vec<Segment<'_>>> {
    let invalid = |reason: &str| Error::InvalidRoute {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let raw: Vec<&str> = split_path(pattern).collect();
    let mut segments = Vec::with_capacity(raw.len());
    for (i, part) in raw.iter().enumerate() {
        let segment = if let Some(name) = part.strip_prefix(':') {
            if name.is_empty() {
                return Err(invalid("named segment without a name"));
            }
            Segment::Named(name)
        } else if let Some(name) = part.strip_prefix('*') {
            if name.is_empty() {
                return Err(invalid("wildcard segment without a name"));
            }
            if i + 1 != raw.len() {
                return Err(invalid("wildcard must be the last segment"));
            }
            Segment::Wildcard(name)
        } else {
            Segment::Literal(part)
        };
        segments.push(segment);
    }

    let mut names: Vec<&str> = segments
        .iter()
        .filter_map(|s| match s {
            Segment::Named(n) | Segment::Wildcard(n) => Some(*n),
            Segment::Literal(_) => None,
        })
        .collect();
    names.sort_unstable();
    if names.windows(2).any(|w| w[0] == w[1]) {
        return Err(invalid("duplicate parameter name"));
    }

    Ok(segments)
}

pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical text for a parsed pattern: `/a/:b/*c`, or `/` for the root.
pub(crate) fn render(segments: &[Segment<'_>]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        match segment {
            Segment::Literal(s) => out.push_str(s),
            Segment::Named(s) => {
                out.push(':');
                out.push_str(s)
            }
            Segment::Wildcard(s) => {
                out.push('*');
                out.push_str(s)
            }
        }
    }
    out
}

#[derive(Debug, Default)]
pub(crate) struct Node {
    route: Option<RouteId>,
    literal: HashMap<String, Node>,
    named: Option<(String, Box<Node>)>,
    wildcard: Option<(String, RouteId)>,
}

/// A successful lookup: the route and its raw (still percent-encoded)
/// parameter values in pattern order.
#[derive(Debug)]
pub(crate) struct Match<'t> {
    pub route: RouteId,
    pub params: Vec<(&'t str, String)>,
}

impl Node {
    pub(crate) fn insert(&mut self, segments: &[Segment<'_>], id: RouteId, pattern: &str) -> Result<()> {
        let conflict = |detail: String| Error::RouteConflict(format!("`{pattern}` {detail}"));

        let Some((first, rest)) = segments.split_first() else {
            if self.route.is_some() {
                return Err(conflict("is already registered".to_string()));
            }
            self.route = Some(id);
            return Ok(());
        };

        match *first {
            Segment::Literal(text) => self
                .literal
                .entry(text.to_string())
                .or_default()
                .insert(rest, id, pattern),
            Segment::Named(name) => {
                let (existing, child) = self
                    .named
                    .get_or_insert_with(|| (name.to_string(), Box::default()));
                if existing.as_str() != name {
                    return Err(conflict(format!(
                        "binds `:{name}` where `:{existing}` is already registered"
                    )));
                }
                child.insert(rest, id, pattern)
            }
            Segment::Wildcard(name) => match &self.wildcard {
                Some((existing, _)) if existing == name => {
                    Err(conflict("is already registered".to_string()))
                }
                Some((existing, _)) => Err(conflict(format!(
                    "binds `*{name}` where `*{existing}` is already registered"
                ))),
                None => {
                    self.wildcard = Some((name.to_string(), id));
                    Ok(())
                }
            },
        }
    }

    pub(crate) fn find<'t>(&'t self, segments: &[&str]) -> Option<Match<'t>> {
        let mut params = Vec::new();
        let route = self.search(segments, &mut params)?;
        Some(Match { route, params })
    }

    fn search<'t>(&'t self, segments: &[&str], params: &mut Vec<(&'t str, String)>) -> Option<RouteId> {
        let Some((first, rest)) = segments.split_first() else {
            // A wildcard also matches an empty remainder.
            return self.route.or_else(|| {
                self.wildcard.as_ref().map(|(name, id)| {
                    params.push((name.as_str(), String::new()));
                    *id
                })
            });
        };

        if let Some(child) = self.literal.get(*first) {
            if let Some(id) = child.search(rest, params) {
                return Some(id);
            }
        }

        if let Some((name, child)) = &self.named {
            params.push((name.as_str(), (*first).to_string()));
            if let Some(id) = child.search(rest, params) {
                return Some(id);
            }
            params.pop();
        }

        self.wildcard.as_ref().map(|(name, id)| {
            params.push((name.as_str(), segments.join("/")));
            *id
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(patterns: &[&str]) -> Node {
        let mut root = Node::default();
        for (id, pattern) in patterns.iter().enumerate() {
            let segments = parse_pattern(pattern).unwrap();
            root.insert(&segments, id, pattern).unwrap();
        }
        root
    }

    fn lookup<'t>(root: &'t Node, path: &str) -> Option<Match<'t>> {
        let segments: Vec<&str> = split_path(path).collect();
        root.find(&segments)
    }

    #[test]
    fn literal_beats_named_at_same_depth() {
        let root = tree(&["/users/:id", "/users/me"]);

        let me = lookup(&root, "/users/me").unwrap();
        assert_eq!(me.route, 1);
        assert!(me.params.is_empty());

        let other = lookup(&root, "/users/42").unwrap();
        assert_eq!(other.route, 0);
        assert_eq!(other.params, vec![("id", "42".to_string())]);
    }

    #[test]
    fn backtracks_out_of_literal_dead_end() {
        let root = tree(&["/users/me/avatar", "/users/:id/settings"]);
        let m = lookup(&root, "/users/me/settings").unwrap();
        assert_eq!(m.route, 1);
        assert_eq!(m.params, vec![("id", "me".to_string())]);
    }

    #[test]
    fn named_beats_wildcard_and_wildcard_binds_rest() {
        let root = tree(&["/files/:name", "/files/*path"]);
        assert_eq!(lookup(&root, "/files/a.txt").unwrap().route, 0);

        let deep = lookup(&root, "/files/css/site/main.css").unwrap();
        assert_eq!(deep.route, 1);
        assert_eq!(deep.params, vec![("path", "css/site/main.css".to_string())]);

        let empty = lookup(&root, "/files").unwrap();
        assert_eq!(empty.route, 1);
        assert_eq!(empty.params, vec![("path", String::new())]);
    }

    #[test]
    fn two_named_segments_at_same_depth_conflict() {
        let mut root = tree(&["/a/:x"]);
        let segments = parse_pattern("/a/:y").unwrap();
        let err = root.insert(&segments, 1, "/a/:y").unwrap_err();
        assert!(matches!(err, Error::RouteConflict(_)));
    }

    #[test]
    fn same_named_segment_may_be_shared() {
        let root = tree(&["/a/:x", "/a/:x/b"]);
        assert_eq!(lookup(&root, "/a/1/b").unwrap().route, 1);
    }

    #[test]
    fn duplicate_pattern_conflicts() {
        let mut root = tree(&["/users"]);
        let segments = parse_pattern("/users/").unwrap();
        assert!(matches!(
            root.insert(&segments, 1, "/users/"),
            Err(Error::RouteConflict(_))
        ));
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert!(parse_pattern("/a/*rest/b").is_err());
        assert!(parse_pattern("/a/:").is_err());
        assert!(parse_pattern("/a/:id/b/:id").is_err());
    }

    #[test]
    fn renders_canonical_pattern() {
        let segments = parse_pattern("//v1/users/:id/").unwrap();
        assert_eq!(render(&segments), "/v1/users/:id");
        assert_eq!(render(&[]), "/");
    }

    #[test]
    fn root_route_matches_root_path() {
        let root = tree(&["/"]);
        assert_eq!(lookup(&root, "/").unwrap().route, 0);
        assert!(lookup(&root, "/x").is_none());
    }
}
