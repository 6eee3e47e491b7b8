//! Compiled route matching.
//!
//! Routes are compiled once at startup into a per-method segment tree.
//! Each tree level holds literal children, at most one named-parameter
//! child and at most one trailing-wildcard terminal. Matching prefers, at
//! every level, an exact literal, then the parameter, then the wildcard;
//! a literal branch that dead-ends backtracks into the parameter branch.
//! The ordering is deterministic and part of the contract: `/users/active`
//! wins over `/users/:id` for the path `/users/active`.
//!
//! A path registered under a different method reports method-not-allowed
//! rather than not-found. An `OPTIONS` request short-circuits to the CORS
//! preflight signal, before method matching, whenever CORS is enabled and
//! the path is registered at all.

use thiserror::Error;
use tracing::debug;

use crate::protocol::Method;

/// Slot of a compiled route entry, assigned at registration.
pub type RouteIndex = usize;

/// One route registration request: `{method, pathPattern, routeIndex}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDef {
    pub method: Method,
    pub pattern: String,
    pub route_index: RouteIndex,
}

impl RouteDef {
    pub fn new(method: Method, pattern: impl Into<String>, route_index: RouteIndex) -> Self {
        Self { method, pattern: pattern.into(), route_index }
    }
}

/// Route compilation failures; fatal at startup.
#[derive(Debug, Error)]
pub enum RouterBuildError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("duplicate registration for {method} '{pattern}'")]
    DuplicateRoute { method: Method, pattern: String },

    #[error("compiled {compiled} of {requested} requested routes")]
    CountMismatch { requested: usize, compiled: usize },
}

/// Result of resolving a method + path against the compiled set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Match(RouteIndex),
    NotFound,
    MethodNotAllowed,
    CorsPreflight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

#[derive(Debug, Default)]
struct Node {
    literals: Vec<(String, Node)>,
    param: Option<Box<Node>>,
    wildcard: Option<RouteIndex>,
    terminal: Option<RouteIndex>,
}

/// The compiled, immutable-after-startup route set.
#[derive(Debug)]
pub struct RouterTree {
    trees: [Option<Node>; 7],
}

impl Default for RouterTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterTree {
    pub fn new() -> Self {
        Self { trees: std::array::from_fn(|_| None) }
    }

    /// Compiles a flat list of definitions. Returns the number of compiled
    /// entries; any invalid or conflicting definition aborts startup.
    pub fn register_routes(&mut self, defs: &[RouteDef]) -> Result<usize, RouterBuildError> {
        for def in defs {
            self.register(def.method, &def.pattern, def.route_index)?;
        }
        Ok(defs.len())
    }

    /// Registers a single `(method, pattern)` pair.
    pub fn register(&mut self, method: Method, pattern: &str, route_index: RouteIndex) -> Result<(), RouterBuildError> {
        let segments = compile_pattern(pattern)?;
        debug!(%method, pattern, route_index, "registering route");

        let mut node = self.trees[method.index()].get_or_insert_with(Node::default);
        for (pos, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    let child = match node.literals.iter().position(|(s, _)| s == lit) {
                        Some(i) => i,
                        None => {
                            node.literals.push((lit.clone(), Node::default()));
                            node.literals.len() - 1
                        }
                    };
                    node = &mut node.literals[child].1;
                }
                Segment::Param(_) => {
                    node = node.param.get_or_insert_with(Box::default).as_mut();
                }
                Segment::Wildcard => {
                    if pos + 1 != segments.len() {
                        return Err(RouterBuildError::InvalidPattern {
                            pattern: pattern.to_owned(),
                            reason: "wildcard must be the final segment",
                        });
                    }
                    if node.wildcard.is_some() {
                        return Err(RouterBuildError::DuplicateRoute { method, pattern: pattern.to_owned() });
                    }
                    node.wildcard = Some(route_index);
                    return Ok(());
                }
            }
        }

        if node.terminal.is_some() {
            return Err(RouterBuildError::DuplicateRoute { method, pattern: pattern.to_owned() });
        }
        node.terminal = Some(route_index);
        Ok(())
    }

    /// Resolves an already-parsed method and path. Captured parameter
    /// values are appended to `params` in pattern declaration order.
    pub fn match_path(
        &self,
        method: Method,
        path: &str,
        params: &mut Vec<String>,
        cors_enabled: bool,
    ) -> RouteOutcome {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if method == Method::Options && cors_enabled {
            return if self.any_method_matches(&segments) { RouteOutcome::CorsPreflight } else { RouteOutcome::NotFound };
        }

        if let Some(tree) = &self.trees[method.index()] {
            if let Some(index) = match_node(tree, &segments, params) {
                return RouteOutcome::Match(index);
            }
        }

        params.clear();
        if self.matches_under_other_method(method, &segments) {
            RouteOutcome::MethodNotAllowed
        } else {
            RouteOutcome::NotFound
        }
    }

    fn any_method_matches(&self, segments: &[&str]) -> bool {
        let mut scratch = Vec::new();
        self.trees.iter().flatten().any(|tree| {
            scratch.clear();
            match_node(tree, segments, &mut scratch).is_some()
        })
    }

    fn matches_under_other_method(&self, method: Method, segments: &[&str]) -> bool {
        let mut scratch = Vec::new();
        self.trees.iter().enumerate().filter(|(i, _)| *i != method.index()).any(|(_, tree)| {
            tree.as_ref().is_some_and(|tree| {
                scratch.clear();
                match_node(tree, segments, &mut scratch).is_some()
            })
        })
    }
}

fn match_node(node: &Node, segments: &[&str], params: &mut Vec<String>) -> Option<RouteIndex> {
    let Some((head, rest)) = segments.split_first() else {
        return node.terminal;
    };

    if let Some((_, child)) = node.literals.iter().find(|(lit, _)| lit == head) {
        if let Some(index) = match_node(child, rest, params) {
            return Some(index);
        }
    }

    if let Some(child) = &node.param {
        params.push((*head).to_owned());
        if let Some(index) = match_node(child, rest, params) {
            return Some(index);
        }
        params.pop();
    }

    // Trailing wildcard swallows this and all remaining segments.
    node.wildcard
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn compile_pattern(pattern: &str) -> Result<Vec<Segment>, RouterBuildError> {
    let invalid = |reason: &'static str| RouterBuildError::InvalidPattern { pattern: pattern.to_owned(), reason };

    if !pattern.starts_with('/') {
        return Err(invalid("pattern must start with '/'"));
    }
    if pattern.contains("//") {
        return Err(invalid("pattern contains double slash"));
    }

    let mut segments = Vec::new();
    for raw in pattern.split('/').filter(|s| !s.is_empty()) {
        if let Some(name) = raw.strip_prefix(':') {
            if !valid_name(name) {
                return Err(invalid("parameter segment needs a valid name"));
            }
            segments.push(Segment::Param(name.to_owned()));
        } else if let Some(name) = raw.strip_prefix('*') {
            // A bare '*' is a valid unnamed wildcard.
            if !name.is_empty() && !valid_name(name) {
                return Err(invalid("wildcard segment has an invalid name"));
            }
            segments.push(Segment::Wildcard);
        } else {
            segments.push(Segment::Literal(raw.to_owned()));
        }
    }
    Ok(segments)
}
