//! Role enforcement for incoming HTTP requests
//!
//! Runs after authentication. The caller's roles are taken from a
//! [`CallerRoles`] request extension when an upstream layer inserted one,
//! otherwise from a trusted header forwarded by the authenticating proxy.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::access::{AccessResolver, CallerRoles, ResourceKey};
use crate::settings::{Settings, DEFAULT_ROLES_HEADER};

/// Reason reported when a caller lacks every required role
pub const MISSING_ROLES_REASON: &str = "User does not have required roles to access this resource";

/// Enforcement state shared by every request
#[derive(Debug)]
pub struct RoleGuard {
    /// `None` when enforcement is disabled
    resolver: Option<AccessResolver>,
    roles_header: HeaderName,
}

impl RoleGuard {
    /// Guard that checks every request against `resolver`
    pub fn new(resolver: AccessResolver) -> Self {
        Self {
            resolver: Some(resolver),
            roles_header: HeaderName::from_static(DEFAULT_ROLES_HEADER),
        }
    }

    /// Guard that lets every request through
    pub fn passthrough() -> Self {
        Self {
            resolver: None,
            roles_header: HeaderName::from_static(DEFAULT_ROLES_HEADER),
        }
    }

    /// Builds the guard described by the `auth` settings
    ///
    /// An invalid header name falls back to the default one.
    pub fn from_settings(settings: &Settings) -> Self {
        let guard = if settings.auth.passthrough {
            Self::passthrough()
        } else {
            Self::new(AccessResolver::new(settings.role_restrictions()))
        };

        match HeaderName::try_from(settings.auth.roles_header.as_str()) {
            Ok(header) => guard.with_roles_header(header),
            Err(_) => {
                warn!(
                    header = %settings.auth.roles_header,
                    "Invalid roles header name, using {}", DEFAULT_ROLES_HEADER
                );
                guard
            }
        }
    }

    pub fn with_roles_header(mut self, header: HeaderName) -> Self {
        self.roles_header = header;
        self
    }

    pub fn is_passthrough(&self) -> bool {
        self.resolver.is_none()
    }

    pub fn resolver(&self) -> Option<&AccessResolver> {
        self.resolver.as_ref()
    }

    /// Caller roles from the forwarded header, empty when absent or unreadable
    fn roles_from_headers(&self, headers: &HeaderMap) -> CallerRoles {
        headers
            .get(&self.roles_header)
            .and_then(|value| value.to_str().ok())
            .map(CallerRoles::from_comma_list)
            .unwrap_or_default()
    }
}

/// Diagnostic body of a rejected request
#[derive(Debug, Serialize)]
pub struct AccessDenied {
    pub success: bool,
    pub resource: ResourceKey,
    pub requires: Vec<String>,
    pub found: CallerRoles,
    pub reason: String,
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Rejects requests whose caller holds none of the roles the route requires
///
/// Install with `axum::middleware::from_fn_with_state(guard, authorize_access)`.
pub async fn authorize_access(
    State(guard): State<Arc<RoleGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(resolver) = guard.resolver() else {
        return next.run(request).await;
    };

    let roles = match request.extensions().get::<CallerRoles>() {
        Some(roles) => roles.clone(),
        None => guard.roles_from_headers(request.headers()),
    };

    let decision = resolver.decide(
        &roles,
        request.uri().path(),
        Some(request.method().as_str()),
    );

    if !decision.allow {
        warn!(
            resource = %decision.resource,
            requires = ?decision.requires,
            found = ?roles.as_slice(),
            "Access denied"
        );

        return AccessDenied {
            success: false,
            resource: decision.resource,
            requires: decision.requires,
            found: roles,
            reason: MISSING_ROLES_REASON.to_string(),
        }
        .into_response();
    }

    debug!(resource = %decision.resource, "Access granted");
    next.run(request).await
}
