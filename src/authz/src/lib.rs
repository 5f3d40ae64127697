//! # Portal Authorization
//!
//! Role-based access control for the user-portal API gateway.
//!
//! ## Features
//!
//! - **Route access resolution** from `METHOD/PATH-GLOB` role restrictions
//! - **Memoized decisions** per resource key, safe to share across threads
//! - **Axum enforcement middleware** returning a diagnostic 401 body
//! - **Layered settings** from a TOML file and `PORTAL__*` environment variables
//! - **Account-control flags** for directory-service user entries
//! - **Input validation** compiled from declarative field descriptors
//!
//! ## Example
//!
//! ```rust
//! use portal_authz::{AccessResolver, RoleRestrictions};
//!
//! let resolver = AccessResolver::new(
//!     RoleRestrictions::new()
//!         .with("admin", "*/users*")
//!         .with("reporter", "GET/users,GET/reports")
//!         .with("developer", "POST/menu,*/users*")
//!         .with("manager", "POST/users*"),
//! );
//!
//! let decision = resolver.can_access("admin", "/users", Some("GET"));
//!
//! assert!(decision.allow);
//! assert_eq!(decision.requires, vec!["admin", "reporter", "developer"]);
//! ```

pub mod access;
pub mod account_control;
pub mod error;
pub mod middleware;
pub mod settings;
pub mod validation;
pub mod web;

// Re-export commonly used types
pub use access::{
    AccessDecision, AccessResolver, CacheStats, CallerRoles, HttpMethod, ResourceKey,
    RoleRestrictions,
};
pub use error::{AuthzError, Result};
pub use middleware::{authorize_access, RoleGuard};
pub use settings::Settings;
pub use validation::{FieldDescriptor, Schema, SchemaCache, ValidationErrors};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
