use std::sync::Arc;

use semver::Version;

use super::{Connector, Isolation};
use crate::error::HubError;

/// Append-only list of connectors, populated once at startup and read-only
/// afterwards.
#[derive(Default)]
pub struct Registry {
    connectors: Vec<Arc<dyn Connector>>,
    whitelist: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts visibility to the named connectors. An empty list allows all.
    pub fn with_whitelist(mut self, names: Vec<String>) -> Self {
        self.whitelist = names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        self
    }

    /// Duplicates are kept; lookups by name return the earliest registration.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        if self.connectors.iter().any(|c| c.name() == connector.name()) {
            tracing::warn!(
                connector = %connector.name(),
                "duplicate connector name, lookups resolve to the first registration"
            );
        }
        self.connectors.push(connector);
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Connectors visible to a client, honouring the whitelist and each
    /// connector's minimum supported client version.
    pub fn all(&self, client_version: Option<&Version>) -> Vec<Arc<dyn Connector>> {
        self.connectors
            .iter()
            .filter(|c| self.whitelist.is_empty() || self.whitelist.iter().any(|w| w == c.name()))
            .filter(|c| match client_version {
                Some(v) => *v >= c.spec().minimum_supported_version,
                None => true,
            })
            .cloned()
            .collect()
    }

    pub fn resolve(
        &self,
        name: &str,
        client_version: Option<&Version>,
    ) -> Result<Arc<dyn Connector>, HubError> {
        self.all(client_version)
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| HubError::NotFound(name.to_string()))
    }

    pub fn resolve_extended(
        &self,
        name: &str,
        client_version: Option<&Version>,
    ) -> Result<Arc<dyn Connector>, HubError> {
        let connector = self.resolve(name, client_version)?;
        if connector.spec().isolation != Isolation::Extended {
            return Err(HubError::Validation(format!(
                "Action {name} is not extended"
            )));
        }
        Ok(connector)
    }
}
