//! Integration tests for the access resolver
//!
//! Covers a realistic portal route table, shared use across tasks and
//! memoization behavior.

use portal_authz::{AccessResolver, CallerRoles, HttpMethod, RoleRestrictions};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Restrictions of a typical portal deployment
fn portal_restrictions() -> RoleRestrictions {
    RoleRestrictions::new()
        .with("admin", "*/users*, */bulletins*, */settings*")
        .with("helpdesk", "GET/users*, PUT/users/*/password")
        .with("editor", "POST/bulletins, PUT/bulletins/*, DELETE/bulletins/*")
        .with("auditor", "GET/users*, GET/settings")
}

#[test]
fn test_portal_route_table() {
    let resolver = AccessResolver::new(portal_restrictions());

    let test_cases = vec![
        // (roles, method, path, allowed, requires)
        (vec!["admin"], "GET", "/users", true, vec!["admin", "helpdesk", "auditor"]),
        (vec!["helpdesk"], "GET", "/users/42", true, vec!["admin", "helpdesk", "auditor"]),
        (vec!["helpdesk"], "PUT", "/users/42/password", true, vec!["admin", "helpdesk"]),
        (vec!["helpdesk"], "DELETE", "/users/42", false, vec!["admin"]),
        (vec!["editor"], "POST", "/bulletins", true, vec!["admin", "editor"]),
        (vec!["editor"], "DELETE", "/bulletins/7", true, vec!["admin", "editor"]),
        (vec!["auditor"], "PUT", "/settings", false, vec!["admin"]),
        (vec!["auditor"], "GET", "/settings/", true, vec!["admin", "auditor"]),
        // Admin's glob also covers the bulletin listing
        (vec![], "GET", "/bulletins", false, vec!["admin"]),
        // Nothing restricts /status
        (vec![], "GET", "/status", true, vec![]),
    ];

    for (roles, method, path, allowed, requires) in test_cases {
        let decision = resolver.can_access(roles.clone(), path, Some(method));
        assert_eq!(
            decision.allow, allowed,
            "{:?} {} {} expected allow={}",
            roles, method, path, allowed
        );
        assert_eq!(decision.requires, requires, "{} {}", method, path);
    }
}

#[test]
fn test_multiple_caller_roles() {
    let resolver = AccessResolver::new(portal_restrictions());

    let roles = CallerRoles::from(vec!["Auditor", "EDITOR"]);
    assert!(resolver.decide(&roles, "/settings", Some("GET")).allow);
    assert!(resolver.decide(&roles, "/bulletins/3", Some("PUT")).allow);
    assert!(!resolver.decide(&roles, "/users/3", Some("DELETE")).allow);
}

#[test]
fn test_required_roles_for_every_method() {
    let resolver = AccessResolver::new(portal_restrictions());

    for method in HttpMethod::ALL {
        let requires = resolver.required_roles("/settings/smtp", Some(method.as_str()));
        assert_eq!(requires, vec!["admin"], "{}", method);
    }
}

#[test]
fn test_configuration_change_needs_new_resolver() {
    let before = AccessResolver::new(RoleRestrictions::new().with("admin", "*/users*"));
    assert!(!before.can_access("guest", "/users", None).allow);

    let after = AccessResolver::new(
        RoleRestrictions::new()
            .with("admin", "*/users*")
            .with("guest", "GET/users"),
    );
    assert!(after.can_access("guest", "/users", None).allow);

    // The first resolver keeps its own memoized answer
    assert!(!before.can_access("guest", "/users", None).allow);
}

#[tokio::test]
async fn test_concurrent_queries() {
    let resolver = Arc::new(AccessResolver::new(portal_restrictions()));
    let mut set = JoinSet::new();

    for i in 0..100 {
        let resolver = Arc::clone(&resolver);
        set.spawn(async move {
            let path = format!("/users/{}", i % 10);
            let roles = if i % 2 == 0 { "helpdesk" } else { "editor" };
            let decision = resolver.can_access(roles, &path, Some("GET"));
            (i, decision)
        });
    }

    let mut completed = 0;
    while let Some(result) = set.join_next().await {
        let (i, decision) = result.unwrap();
        assert_eq!(decision.allow, i % 2 == 0);
        assert_eq!(decision.requires, vec!["admin", "helpdesk", "auditor"]);
        completed += 1;
    }

    assert_eq!(completed, 100);

    let stats = resolver.stats();
    assert_eq!(stats.size, 10);
    assert_eq!(stats.hit_count + stats.miss_count, 100);
}

#[test]
fn test_cache_grows_one_entry_per_resource_key() {
    let resolver = AccessResolver::new(portal_restrictions());

    for _ in 0..3 {
        resolver.can_access("admin", "/users", Some("GET"));
        resolver.can_access("admin", "/users", Some("POST"));
        resolver.can_access("admin", "users/", Some("BREW"));
    }

    // BREW collapses onto GET/users
    assert_eq!(resolver.cache_size(), 2);
    let stats = resolver.stats();
    assert_eq!(stats.miss_count, 2);
    assert_eq!(stats.hit_count, 7);
}
