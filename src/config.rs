use std::env;

use rocket::figment::providers::Serialized;
use rocket::figment::Figment;
use serde::Deserialize;

use crate::gateway::GatewayConfig;

/// Where todos live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub secret: Option<String>,
}

/// Service settings read from the Rocket figment next to Rocket's own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub storage: Storage,
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
}

/// Connection settings from the `DB_*` variables the deployment provides.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseEnv {
    pub name: String,
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
    /// Seconds to wait for a pooled connection.
    pub timeout: u8,
}

impl DatabaseEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        Self {
            name: var("DB_NAME", "todos"),
            host: var("DB_HOST", "localhost"),
            port: var("DB_PORT", "5432"),
            username: var("DB_USERNAME", "admin"),
            password: var("DB_PASSWORD", "admin"),
            timeout: lookup("DB_TIMEOUT")
                .and_then(|t| t.parse().ok())
                .unwrap_or(5),
        }
    }

    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.name
        )
    }
}

/// Rocket's figment with the `DB_*` defaults joined under
/// `databases.todos` and `API_GATEWAY_URL` taking precedence over
/// `gateway.url`.
pub fn figment() -> Figment {
    let database = DatabaseEnv::from_env();
    let figment = rocket::Config::figment()
        .join(("databases.todos.url", database.url()))
        .join(("databases.todos.timeout", database.timeout));

    match env::var("API_GATEWAY_URL") {
        Ok(url) => figment.merge(Serialized::global("gateway.url", url)),
        Err(_) => figment,
    }
}
