//! Memoized role resolution per resource key

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};

use super::types::{
    split_by_comma, AccessDecision, CallerRoles, HttpMethod, ResourceKey, RoleRestrictions,
};

/// Cache statistics for monitoring memoization
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub size: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
}

/// Compiled glob set of one role
struct RoleMatcher {
    role: String,
    globs: Vec<GlobMatcher>,
}

impl RoleMatcher {
    /// Patterns that fail to compile are dropped and so never match
    fn compile(role: &str, patterns: &str) -> Self {
        let globs = split_by_comma(patterns)
            .iter()
            .filter_map(|pattern| compile_glob(role, pattern))
            .collect();

        Self {
            role: role.to_string(),
            globs,
        }
    }

    fn matches(&self, resource: &ResourceKey) -> bool {
        self.globs.iter().any(|glob| glob.is_match(resource.as_str()))
    }
}

/// Case-insensitive glob where `*` also spans `/`
fn compile_glob(role: &str, pattern: &str) -> Option<GlobMatcher> {
    match GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
    {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(e) => {
            warn!(role, pattern, error = %e, "Ignoring invalid resource pattern");
            None
        }
    }
}

/// Answers "can these roles access this resource?" for a fixed restrictions mapping
///
/// The set of roles required by a resource key is computed once, on first
/// query, and kept for the lifetime of the resolver. Entries are never
/// evicted; the key space is bounded by the application's routes.
///
/// # Thread Safety
///
/// The memo cache is a `DashMap`, so a resolver can be shared across threads
/// behind an `Arc`. Concurrent first queries of the same key may both compute
/// it; the results are identical.
///
/// # Examples
///
/// ```
/// use portal_authz::{AccessResolver, RoleRestrictions};
///
/// let resolver = AccessResolver::new(
///     RoleRestrictions::new()
///         .with("admin", "*/users*")
///         .with("reporter", "GET/users*"),
/// );
///
/// let decision = resolver.can_access("reporter", "/users", Some("GET"));
/// assert!(decision.allow);
/// assert_eq!(decision.requires, vec!["admin", "reporter"]);
/// assert_eq!(decision.resource.as_str(), "GET/users");
///
/// assert!(!resolver.can_access("reporter", "/users", Some("POST")).allow);
/// ```
pub struct AccessResolver {
    matchers: Vec<RoleMatcher>,
    unrestricted: bool,
    cache: DashMap<ResourceKey, Arc<[String]>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl AccessResolver {
    /// Compiles `restrictions` into per-role glob sets
    ///
    /// Glob syntax is not validated up front; a malformed pattern simply never matches.
    pub fn new(restrictions: RoleRestrictions) -> Self {
        let matchers: Vec<RoleMatcher> = restrictions
            .iter()
            .map(|(role, patterns)| RoleMatcher::compile(role, patterns))
            .collect();

        debug!(roles = matchers.len(), "Compiled role restrictions");

        Self {
            unrestricted: restrictions.is_empty(),
            matchers,
            cache: DashMap::new(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// A resolver with no restrictions, allowing every query
    pub fn unrestricted() -> Self {
        Self::new(RoleRestrictions::default())
    }

    /// Whether the resolver was built from an empty mapping
    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    /// Decides whether `roles` may access `path` with `method` (GET when absent or unrecognized)
    pub fn can_access(
        &self,
        roles: impl Into<CallerRoles>,
        path: &str,
        method: Option<&str>,
    ) -> AccessDecision {
        self.decide(&roles.into(), path, method)
    }

    /// Borrowing form of [`AccessResolver::can_access`]
    pub fn decide(&self, roles: &CallerRoles, path: &str, method: Option<&str>) -> AccessDecision {
        let resource = ResourceKey::new(HttpMethod::from_option(method), path);

        if self.unrestricted {
            return AccessDecision {
                allow: true,
                requires: Vec::new(),
                resource,
            };
        }

        let requires = self.allowed_roles_for(&resource);
        let allow = requires.is_empty() || roles.intersects(&requires);

        AccessDecision {
            allow,
            requires: requires.to_vec(),
            resource,
        }
    }

    /// Roles whose patterns match `path` with `method`, in declaration order
    pub fn required_roles(&self, path: &str, method: Option<&str>) -> Vec<String> {
        if self.unrestricted {
            return Vec::new();
        }
        let resource = ResourceKey::new(HttpMethod::from_option(method), path);
        self.allowed_roles_for(&resource).to_vec()
    }

    /// Cached role list for `resource`, computed on first use
    fn allowed_roles_for(&self, resource: &ResourceKey) -> Arc<[String]> {
        if let Some(entry) = self.cache.get(resource) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(entry.value());
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let roles: Arc<[String]> = self
            .matchers
            .iter()
            .filter(|matcher| matcher.matches(resource))
            .map(|matcher| matcher.role.clone())
            .collect();

        debug!(resource = %resource, requires = ?roles, "Resolved required roles");

        self.cache.insert(resource.clone(), Arc::clone(&roles));
        roles
    }

    /// Number of memoized resource keys
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Returns cache statistics
    pub fn stats(&self) -> CacheStats {
        let hit_count = self.hit_count.load(Ordering::Relaxed);
        let miss_count = self.miss_count.load(Ordering::Relaxed);
        let total = hit_count + miss_count;

        CacheStats {
            size: self.cache.len(),
            hit_count,
            miss_count,
            hit_rate: if total == 0 {
                0.0
            } else {
                hit_count as f64 / total as f64
            },
        }
    }
}

impl Default for AccessResolver {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl fmt::Debug for AccessResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessResolver")
            .field(
                "roles",
                &self.matchers.iter().map(|m| m.role.as_str()).collect::<Vec<_>>(),
            )
            .field("unrestricted", &self.unrestricted)
            .field("cached", &self.cache.len())
            .finish()
    }
}
