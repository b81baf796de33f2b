//! Reportability filters.
//!
//! Each dimension (path, method, status) is optional. An empty dimension
//! places no restriction; non-empty dimensions are ANDed.

use regex::Regex;
use std::collections::HashSet;

/// Compiled filter set for one interceptor.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub(crate) paths: Vec<Regex>,
    pub(crate) methods: HashSet<String>,
    pub(crate) statuses: HashSet<u16>,
}

impl Filters {
    /// Path patterns, deduplicated by source text.
    pub fn paths(&self) -> &[Regex] {
        &self.paths
    }

    /// Case-sensitive HTTP verbs.
    pub fn methods(&self) -> &HashSet<String> {
        &self.methods
    }

    /// Status codes.
    pub fn statuses(&self) -> &HashSet<u16> {
        &self.statuses
    }

    /// True when no dimension restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        self.paths.is_empty() && self.methods.is_empty() && self.statuses.is_empty()
    }

    pub fn path_matches(&self, path: &str) -> bool {
        self.paths.is_empty() || self.paths.iter().any(|re| re.is_match(path))
    }

    pub fn method_matches(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    pub fn status_matches(&self, status: u16) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&status)
    }

    /// Whether an exchange with this path, verb and response status is reported.
    pub fn is_reportable(&self, path: &str, method: &str, status: u16) -> bool {
        self.path_matches(path) && self.method_matches(method) && self.status_matches(status)
    }
}
