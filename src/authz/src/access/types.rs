//! Access-control value types: methods, resource keys, restrictions, decisions

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{AuthzError, Result};

/// HTTP methods recognized in resource keys
///
/// Anything else, including lowercase spellings, is coerced to [`HttpMethod::Get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Every recognized method
    pub const ALL: [HttpMethod; 6] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    /// Uppercase method name as it appears in resource keys
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Parses a method by exact, case-sensitive match, defaulting to GET
    pub fn parse_or_default(method: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == method)
            .unwrap_or_default()
    }

    /// Same as [`HttpMethod::parse_or_default`], GET when no method is given
    pub fn from_option(method: Option<&str>) -> Self {
        method.map(Self::parse_or_default).unwrap_or_default()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strips outer whitespace, then every leading and trailing `/`
pub fn normalize_path(path: &str) -> &str {
    path.trim().trim_end_matches('/').trim_start_matches('/')
}

/// Canonical `METHOD/normalized-path` identifier of an access-controlled endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Builds the key for `method` and the normalized form of `path`
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self(format!("{}/{}", method, normalize_path(path)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Splits a comma-delimited list, trimming tokens and dropping empty ones
///
/// `"foo,  bar  , baz, ,"` yields `["foo", "bar", "baz"]`.
pub fn split_by_comma(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Role name to comma-separated resource patterns, in declaration order
///
/// Patterns take the form `METHOD/PATH-GLOB` (e.g. `GET/users*`) or
/// `*/PATH-GLOB` for any method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleRestrictions(IndexMap<String, String>);

impl RoleRestrictions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the pattern list of `role`, keeping its original position
    pub fn with(mut self, role: impl Into<String>, patterns: impl Into<String>) -> Self {
        self.0.insert(role.into(), patterns.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, role: &str) -> Option<&str> {
        self.0.get(role).map(String::as_str)
    }

    /// Iterates `(role, pattern list)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(role, patterns)| (role.as_str(), patterns.as_str()))
    }

    /// Parsed pattern tokens of `role`
    pub fn patterns(&self, role: &str) -> Vec<String> {
        self.get(role).map(split_by_comma).unwrap_or_default()
    }

    /// Rejects mappings containing a blank role name
    pub fn validate(&self) -> Result<()> {
        if self.0.keys().any(|role| role.trim().is_empty()) {
            return Err(AuthzError::InvalidRestrictions(
                "role names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<IndexMap<String, String>> for RoleRestrictions {
    fn from(map: IndexMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for RoleRestrictions
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(role, patterns)| (role.into(), patterns.into()))
                .collect(),
        )
    }
}

/// Roles held by the caller, as supplied
///
/// A single string is a one-element role set. Comparison against required
/// roles is case-insensitive; see [`CallerRoles::normalized`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CallerRoles(Vec<String>);

impl CallerRoles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-delimited role list, e.g. a forwarded header value
    pub fn from_comma_list(value: &str) -> Self {
        Self(split_by_comma(value))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercased, trimmed, non-empty and deduplicated roles
    pub fn normalized(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.0
            .iter()
            .map(|role| role.trim().to_lowercase())
            .filter(|role| !role.is_empty())
            .filter(|role| seen.insert(role.clone()))
            .collect()
    }

    /// Whether any of these roles appears in `required`, ignoring case
    pub fn intersects(&self, required: &[String]) -> bool {
        let held: HashSet<String> = self.normalized().into_iter().collect();
        required
            .iter()
            .any(|role| held.contains(&role.to_lowercase()))
    }
}

impl From<&str> for CallerRoles {
    fn from(role: &str) -> Self {
        Self(vec![role.to_string()])
    }
}

impl From<String> for CallerRoles {
    fn from(role: String) -> Self {
        Self(vec![role])
    }
}

impl From<Vec<String>> for CallerRoles {
    fn from(roles: Vec<String>) -> Self {
        Self(roles)
    }
}

impl From<Vec<&str>> for CallerRoles {
    fn from(roles: Vec<&str>) -> Self {
        roles.into_iter().collect()
    }
}

impl From<&[&str]> for CallerRoles {
    fn from(roles: &[&str]) -> Self {
        roles.iter().copied().collect()
    }
}

impl<const N: usize> From<[&str; N]> for CallerRoles {
    fn from(roles: [&str; N]) -> Self {
        roles.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for CallerRoles {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Outcome of a single access query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    /// Whether the caller may access the resource
    pub allow: bool,
    /// Every role whose patterns match the resource, in declaration order
    pub requires: Vec<String>,
    /// Resource key the query resolved to
    pub resource: ResourceKey,
}
