//! Gateway settings: defaults, optional TOML file, `PORTAL__*` environment overrides

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::access::RoleRestrictions;
use crate::error::{AuthzError, Result};

/// Environment assumed when none is configured
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Header an upstream authenticator uses to forward caller roles
pub const DEFAULT_ROLES_HEADER: &str = "x-remote-roles";

/// Prefix of environment variable overrides, e.g. `PORTAL__SERVER__PORT=9090`
pub const ENV_PREFIX: &str = "PORTAL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment name reported by `/status`
    pub env: String,
    pub server: Server,
    pub auth: Auth,
    pub logger: Logger,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Auth {
    /// Skip role enforcement entirely
    pub passthrough: bool,
    /// Request header carrying the caller's comma-separated roles
    pub roles_header: String,
    /// Role name to comma-separated `METHOD/PATH-GLOB` patterns
    pub restrictions: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Logger {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: DEFAULT_ENVIRONMENT.to_string(),
            server: Server::default(),
            auth: Auth::default(),
            logger: Logger::default(),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            passthrough: false,
            roles_header: DEFAULT_ROLES_HEADER.to_string(),
            restrictions: IndexMap::new(),
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Role names exactly as declared in the settings file
///
/// `config` lowercases table keys, so the file is also parsed with `toml`
/// to recover the original spelling.
#[derive(Debug, Default, Deserialize)]
struct DeclaredRoles {
    #[serde(default)]
    auth: DeclaredAuth,
}

#[derive(Debug, Default, Deserialize)]
struct DeclaredAuth {
    #[serde(default)]
    restrictions: IndexMap<String, toml::Value>,
}

impl DeclaredRoles {
    /// Declared spelling of a role name `config` handed back lowercased
    fn spelling_of(&self, role: &str) -> Option<&str> {
        self.auth
            .restrictions
            .keys()
            .find(|declared| declared.to_lowercase() == role)
            .map(String::as_str)
    }
}

impl Settings {
    /// Loads settings from `path` (skipped when missing) and the environment
    ///
    /// Role names keep the spelling used in the file. Roles added only through
    /// environment variables come back lowercased.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut builder = config::Config::builder();
        let mut declared = DeclaredRoles::default();

        if path.exists() {
            debug!(path = %path.display(), "Loading settings file");
            let contents =
                std::fs::read_to_string(path).map_err(|source| AuthzError::ReadSettings {
                    path: path.display().to_string(),
                    source,
                })?;
            declared = toml::from_str(&contents)?;
            builder = builder.add_source(config::File::from_str(&contents, config::FileFormat::Toml));
        }

        // Environment overrides: PORTAL__SERVER__PORT=9090, etc.
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.auth.restrictions = settings
            .auth
            .restrictions
            .into_iter()
            .map(|(role, patterns)| match declared.spelling_of(&role) {
                Some(spelling) => (spelling.to_string(), patterns),
                None => (role, patterns),
            })
            .collect();
        settings.role_restrictions().validate()?;

        Ok(settings)
    }

    /// Restrictions mapping in declaration order
    pub fn role_restrictions(&self) -> RoleRestrictions {
        RoleRestrictions::from(self.auth.restrictions.clone())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_settings_load_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nonexistent.toml");

        let settings = Settings::load(&config_path).expect("Failed to load settings");

        assert_eq!(settings.env, "development");
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert!(!settings.auth.passthrough);
        assert_eq!(settings.auth.roles_header, "x-remote-roles");
        assert!(settings.role_restrictions().is_empty());
        assert_eq!(settings.logger.format, LogFormat::Pretty);
    }

    #[test]
    fn test_settings_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("portal.toml");

        let config_content = r#"
env = "staging"

[server]
host = "127.0.0.1"
port = 9191

[auth]
roles_header = "x-portal-roles"

[auth.restrictions]
admin = "*/users*"
reporter = "GET/users,GET/reports"
developer = "POST/menu,*/users*"
manager = "POST/users*"

[logger]
level = "debug"
format = "json"
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        let settings = Settings::load(&config_path).expect("Failed to load settings");

        assert_eq!(settings.env, "staging");
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9191);
        assert_eq!(settings.bind_address(), "127.0.0.1:9191");
        assert_eq!(settings.auth.roles_header, "x-portal-roles");
        assert_eq!(settings.logger.level, "debug");
        assert_eq!(settings.logger.format, LogFormat::Json);

        let restrictions = settings.role_restrictions();
        let roles: Vec<&str> = restrictions.iter().map(|(role, _)| role).collect();
        assert_eq!(roles, vec!["admin", "reporter", "developer", "manager"]);
        assert_eq!(restrictions.get("reporter"), Some("GET/users,GET/reports"));
    }

    #[test]
    fn test_settings_reject_non_string_patterns() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("portal.toml");

        let config_content = r#"
[auth.restrictions]
admin = ["GET/users"]
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        let result = Settings::load(&config_path);
        assert!(matches!(result, Err(AuthzError::Config(_))));
    }

    #[test]
    fn test_settings_keep_declared_role_spelling() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("portal.toml");

        let config_content = r#"
[auth.restrictions]
SuperAdmin = "*/users*"
reporter = "GET/users"
Admin = "*/settings*"
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        let settings = Settings::load(&config_path).expect("Failed to load settings");
        let roles: Vec<&str> = settings.auth.restrictions.keys().map(String::as_str).collect();
        assert_eq!(roles, vec!["SuperAdmin", "reporter", "Admin"]);

        let resolver = crate::AccessResolver::new(settings.role_restrictions());
        let decision = resolver.can_access("superadmin", "/users", None);
        assert!(decision.allow);
        assert_eq!(decision.requires, vec!["SuperAdmin", "reporter"]);
    }

    #[test]
    fn test_settings_reject_malformed_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("portal.toml");
        fs::write(&config_path, "[auth\nrestrictions = ").expect("Failed to write config");

        let result = Settings::load(&config_path);
        assert!(matches!(result, Err(AuthzError::ParseSettings(_))));
    }

    #[test]
    fn test_settings_path_is_a_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let result = Settings::load(temp_dir.path());
        assert!(matches!(result, Err(AuthzError::ReadSettings { .. })));
    }
}
