//! Integrations subsystem — owns the configured integration instances.
//!
//! Instances are built at construction, in declaration order, and driven
//! through the plugin lifecycle in that same order. A message
//! `integrations/<id>/<rest>` is forwarded to instance `<id>` as `<rest>`.

use std::sync::Arc;

use async_trait::async_trait;
use homectl_domain::error::HomectlError;
use homectl_domain::integration::IntegrationConfig;
use homectl_domain::path::split_first;

use crate::bus::Bus;
use crate::ports::Plugin;
use crate::registry::IntegrationRegistry;

/// Loader and router for integration plugins.
pub struct Integrations {
    instances: Vec<(String, Arc<dyn Plugin>)>,
}

impl Integrations {
    /// Instantiate every configured integration.
    ///
    /// # Errors
    ///
    /// Returns [`HomectlError::InvalidConfig`] for a config slice that is not
    /// a table with a `plugin` key, [`HomectlError::UnknownPlugin`] for an
    /// unregistered identifier, or the plugin's own config error.
    pub fn new(
        configs: &serde_json::Map<String, serde_json::Value>,
        registry: &IntegrationRegistry,
    ) -> Result<Self, HomectlError> {
        let instances = configs
            .iter()
            .map(|(id, raw)| {
                let config: IntegrationConfig = serde_json::from_value(raw.clone())
                    .map_err(|err| HomectlError::invalid_config(format!("integrations/{id}"), err))?;
                let plugin = registry.create(id, &config)?;
                tracing::debug!(integration = %id, plugin = %config.plugin, "integration loaded");
                Ok((id.clone(), plugin))
            })
            .collect::<Result<Vec<_>, HomectlError>>()?;

        Ok(Self { instances })
    }

    /// Wrap already built instances, keeping their order.
    #[must_use]
    pub fn from_instances(instances: Vec<(String, Arc<dyn Plugin>)>) -> Self {
        Self { instances }
    }

    /// Integration ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.instances.iter().map(|(id, _)| id.as_str())
    }

    fn get(&self, id: &str) -> Option<&Arc<dyn Plugin>> {
        self.instances
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, plugin)| plugin)
    }
}

#[async_trait]
impl Plugin for Integrations {
    async fn register(&self, bus: &Bus) -> Result<(), HomectlError> {
        for (id, plugin) in &self.instances {
            tracing::info!(integration = %id, "registering integration");
            plugin.register(bus).await?;
        }
        Ok(())
    }

    async fn start(&self, bus: &Bus) -> Result<(), HomectlError> {
        for (id, plugin) in &self.instances {
            tracing::debug!(integration = %id, "starting integration");
            plugin.start(bus).await?;
        }
        Ok(())
    }

    async fn handle_msg(
        &self,
        path: &str,
        payload: serde_json::Value,
        bus: &Bus,
    ) -> Result<serde_json::Value, HomectlError> {
        let (id, rest) = split_first(path);
        match self.get(id) {
            Some(plugin) => plugin.handle_msg(rest, payload, bus).await,
            None => {
                tracing::warn!(integration = id, path, "no such integration");
                Ok(serde_json::Value::Null)
            }
        }
    }

    async fn stop(&self) {
        for (id, plugin) in self.instances.iter().rev() {
            tracing::debug!(integration = %id, "stopping integration");
            plugin.stop().await;
        }
    }
}
