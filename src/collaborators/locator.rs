use super::LocatorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Parse `host:port`.
    pub fn parse(s: &str) -> Option<Self> {
        let (host, port) = s.trim().rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        Some(Self::new(host, port.parse().ok()?))
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}:{}/{}", self.host, self.port, path.trim_start_matches('/'))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Maps a logical service name to the endpoints currently serving it.
#[async_trait]
pub trait ServiceLocator: Send + Sync {
    async fn resolve(&self, service: &str) -> Result<Vec<Endpoint>, LocatorError>;
}

/// Fixed service table, for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    services: HashMap<String, Vec<Endpoint>>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, name: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        self.services.insert(name.into(), endpoints);
        self
    }
}

#[async_trait]
impl ServiceLocator for StaticLocator {
    async fn resolve(&self, service: &str) -> Result<Vec<Endpoint>, LocatorError> {
        match self.services.get(service) {
            Some(endpoints) if !endpoints.is_empty() => Ok(endpoints.clone()),
            _ => Err(LocatorError::NoEndpoints(service.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    #[serde(default)]
    node: Option<CatalogNode>,
    service: CatalogService,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogNode {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogService {
    #[serde(default)]
    address: String,
    port: u16,
}

/// Resolves services through a Consul agent's health endpoint.
pub struct ConsulLocator {
    agent: String,
    client: reqwest::Client,
}

impl ConsulLocator {
    pub fn new(agent: impl Into<String>, timeout: Duration) -> Result<Self, LocatorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LocatorError::Unreachable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            agent: agent.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn health_url(&self, service: &str) -> String {
        let base = if self.agent.starts_with("http://") || self.agent.starts_with("https://") {
            self.agent.clone()
        } else {
            format!("http://{}", self.agent)
        };
        format!("{}/v1/health/service/{}", base, service)
    }
}

#[async_trait]
impl ServiceLocator for ConsulLocator {
    async fn resolve(&self, service: &str) -> Result<Vec<Endpoint>, LocatorError> {
        let url = self.health_url(service);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LocatorError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocatorError::Unreachable(format!("HTTP {} from {}", response.status().as_u16(), url)));
        }

        let entries: Vec<HealthEntry> = response
            .json()
            .await
            .map_err(|e| LocatorError::Malformed(e.to_string()))?;

        let endpoints = endpoints_from(entries);
        debug!("Resolved {} to {} endpoint(s)", service, endpoints.len());

        if endpoints.is_empty() {
            return Err(LocatorError::NoEndpoints(service.to_string()));
        }
        Ok(endpoints)
    }
}

// Consul leaves the service address empty when it equals the node address.
fn endpoints_from(entries: Vec<HealthEntry>) -> Vec<Endpoint> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let host = if entry.service.address.is_empty() {
                entry.node.map(|n| n.address).unwrap_or_default()
            } else {
                entry.service.address
            };
            (!host.is_empty()).then(|| Endpoint::new(host, entry.service.port))
        })
        .collect()
}
