//! Self-registration with the Kong API gateway.
//!
//! Registration runs as an ignite fairing so that a failure stops the
//! service before it ever binds its port.

use std::time::Duration;

use log::{error, info};
use reqwest::{Client, StatusCode};
use rocket::fairing::{AdHoc, Fairing};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,
    /// Kong admin API base URL.
    pub url: String,
    pub name: String,
    /// Path prefixes routed to this service.
    pub paths: Vec<String>,
    /// Host and port the gateway forwards to.
    pub host: String,
    pub port: u16,
    /// Per-request timeout in seconds.
    pub timeout: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:8001".to_string(),
            name: "microservice-todo".to_string(),
            paths: vec!["/todos".to_string()],
            host: "microservice-todo.services.consul".to_string(),
            port: 8000,
            timeout: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway answered {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// API definition as understood by Kong's `/apis` admin endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiDefinition {
    pub name: String,
    pub uris: Vec<String>,
    pub upstream_url: String,
}

impl From<&GatewayConfig> for ApiDefinition {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            name: config.name.clone(),
            uris: config.paths.clone(),
            upstream_url: format!("http://{}:{}", config.host, config.port),
        }
    }
}

pub struct KongRegistrar {
    client: Client,
    admin_url: String,
}

impl KongRegistrar {
    pub fn new(admin_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            admin_url: admin_url.trim_end_matches('/').to_string(),
        })
    }

    fn apis_url(&self) -> String {
        format!("{}/apis", self.admin_url)
    }

    fn api_url(&self, name: &str) -> String {
        format!("{}/apis/{}", self.admin_url, name)
    }

    /// Creates the API, or patches it in place when one with the same name
    /// is already registered.
    pub async fn register(&self, api: &ApiDefinition) -> Result<(), GatewayError> {
        let existing = self.client.get(self.api_url(&api.name)).send().await?;
        let request = match existing.status() {
            StatusCode::NOT_FOUND => self.client.post(self.apis_url()),
            status if status.is_success() => self.client.patch(self.api_url(&api.name)),
            status => return Err(rejected(status, existing).await),
        };

        let response = request.json(api).send().await?;
        if !response.status().is_success() {
            return Err(rejected(response.status(), response).await);
        }

        Ok(())
    }
}

async fn rejected(status: StatusCode, response: reqwest::Response) -> GatewayError {
    let body = response.text().await.unwrap_or_default();
    GatewayError::Rejected { status, body }
}

pub fn fairing(config: GatewayConfig) -> impl Fairing {
    AdHoc::try_on_ignite("Gateway Registration", move |rocket| async move {
        let api = ApiDefinition::from(&config);
        let registrar = KongRegistrar::new(&config.url, Duration::from_secs(config.timeout));
        let result = match registrar {
            Ok(registrar) => registrar.register(&api).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("registered {} at {} for {:?}", api.upstream_url, config.url, api.uris);
                Ok(rocket)
            }
            Err(e) => {
                error!("gateway registration with {} failed: {}", config.url, e);
                Err(rocket)
            }
        }
    })
}
