//! Route access control by role.
//!
//! This module maps a `METHOD/path` resource key to the set of roles allowed
//! to reach it:
//! - Role restrictions are glob patterns such as `GET/users*` or `*/reports*`
//! - Matching is case-insensitive and `*` spans `/`
//! - Resolved role sets are memoized per resource key
//! - Resources no role restricts are open to everyone

mod resolver;
mod types;

pub use resolver::{AccessResolver, CacheStats};
pub use types::{
    normalize_path, split_by_comma, AccessDecision, CallerRoles, HttpMethod, ResourceKey,
    RoleRestrictions,
};
