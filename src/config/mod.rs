//! Configuration loading and management
//!
//! Configuration comes from the process environment (optionally seeded from a
//! `.env` file by the binary). Loading goes through a lookup function so tests
//! can supply variables without touching the real environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:3000"];

/// Variables that must be present (and non-empty) for startup to proceed
pub const REQUIRED_VARS: &[&str] = &[
    "MONGODB_URI",
    "MONGODB_DATABASE",
    "MONGODB_COLLECTION",
    "AUTH0_DOMAIN",
    "AUTH0_AUDIENCE",
];

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),

    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidValue {
                name: "APP_ENV",
                message: format!("unknown environment '{}'", other),
            }),
        }
    }
}

/// Datastore connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

/// Identity-provider settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Tenant domain, e.g. `tenant.auth0.com`
    pub domain: String,
    /// Expected `aud` claim
    pub audience: String,
    /// Permissions every admin token must carry (empty: authentication suffices)
    pub required_permissions: Vec<String>,
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub environment: Environment,
    pub mongodb: MongoConfig,
    pub auth: AuthConfig,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup
    ///
    /// Every missing required variable is reported, not just the first.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|name| get(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }
        let required = |name: &str| get(name).unwrap_or_default();

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                message: format!("'{}' is not a valid port", raw),
            })?,
            None => DEFAULT_PORT,
        };

        let environment = match get("APP_ENV").or_else(|| get("NODE_ENV")) {
            Some(raw) => raw.parse()?,
            None => Environment::default(),
        };

        let allowed_origins = match get("ALLOWED_ORIGINS") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            port,
            environment,
            mongodb: MongoConfig {
                uri: required("MONGODB_URI"),
                database: required("MONGODB_DATABASE"),
                collection: required("MONGODB_COLLECTION"),
            },
            auth: AuthConfig {
                domain: required("AUTH0_DOMAIN"),
                audience: required("AUTH0_AUDIENCE"),
                required_permissions: get("AUTH0_REQUIRED_PERMISSIONS")
                    .map(|raw| split_list(&raw))
                    .unwrap_or_default(),
            },
            allowed_origins,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
