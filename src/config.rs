use std::{env, fmt, net::IpAddr};

use thiserror::Error;

use crate::models::role::{RoleName, RoleSet, RoleSetError};

pub const DEFAULT_ROLES: &str = r#"["Super Admin", "User"]"#;
pub const DEFAULT_REGISTRATION_ROLE: &str = "User";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
/// Default: 200ms/token (~5 req/sec)
pub const DEFAULT_RATE_LIMIT_MS: u64 = 200;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is not valid: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("ROLES is not valid: {0}")]
    Roles(#[from] RoleSetError),
    #[error("DEFAULT_REGISTRATION_ROLE '{0}' not found in ROLES")]
    UnknownDefaultRole(String),
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub server_host: IpAddr,
    pub server_port: u16,
    pub roles: RoleSet,
    pub default_registration_role: RoleName,
    pub super_admin_email: String,
    pub super_admin_password: String,
    pub cors_allowed_origin: Option<String>,
    pub rate_limit_ms: u64,
    pub rate_limit_burst: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("db_max_connections", &self.db_max_connections)
            .field("roles", &self.roles)
            .field("default_registration_role", &self.default_registration_role)
            .field("super_admin_email", &self.super_admin_email)
            .field("cors_allowed_origin", &self.cors_allowed_origin)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Reads the process environment. The binary loads `.env` before calling this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let database_url = require("DATABASE_URL")?;
        let super_admin_email = require("SUPER_ADMIN_EMAIL")?;
        let super_admin_password = require("SUPER_ADMIN_PASSWORD")?;

        let role_names: Vec<String> = serde_json::from_str(
            &get("ROLES").unwrap_or_else(|| DEFAULT_ROLES.to_string()),
        )
        .map_err(|e| ConfigError::Invalid {
            key: "ROLES",
            reason: e.to_string(),
        })?;
        let roles = RoleSet::new(role_names)?;

        let wanted_default =
            get("DEFAULT_REGISTRATION_ROLE").unwrap_or_else(|| DEFAULT_REGISTRATION_ROLE.into());
        let default_registration_role = roles
            .resolve(&wanted_default)
            .cloned()
            .ok_or(ConfigError::UnknownDefaultRole(wanted_default))?;

        Ok(Config {
            database_url,
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            server_host: parse_or(&get, "SERVER_HOST", IpAddr::from([0, 0, 0, 0]))?,
            server_port: parse_or(&get, "SERVER_PORT", DEFAULT_SERVER_PORT)?,
            roles,
            default_registration_role,
            super_admin_email,
            super_admin_password,
            cors_allowed_origin: get("CORS_ALLOWED_ORIGIN"),
            rate_limit_ms: parse_or(&get, "RATE_LIMITER_MILLISECONDS", DEFAULT_RATE_LIMIT_MS)?,
            rate_limit_burst: parse_or(&get, "RATE_LIMITER_BURST", DEFAULT_RATE_LIMIT_BURST)?,
        })
    }

    pub fn privileged_role(&self) -> &RoleName {
        self.roles.privileged()
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    let roles = RoleSet::new(["Super Admin", "User"]).expect("test roles are valid");
    let default_registration_role = roles.resolve("User").cloned().expect("User role exists");
    Config {
        database_url: String::new(),
        db_max_connections: 1,
        server_host: IpAddr::from([127, 0, 0, 1]),
        server_port: 0,
        roles,
        default_registration_role,
        super_admin_email: "root@example.com".into(),
        super_admin_password: "rootpass".into(),
        cors_allowed_origin: None,
        rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
        rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
    }
}
