//! Dummy — does the bare minimum: accepts any config, logs registration.

use std::sync::Arc;

use async_trait::async_trait;
use homectl_app::bus::Bus;
use homectl_app::ports::Plugin;
use homectl_domain::error::HomectlError;
use homectl_domain::integration::IntegrationConfig;

/// An integration that logs its registration and ignores every message.
pub struct Dummy {
    id: String,
    settings: serde_json::Map<String, serde_json::Value>,
}

impl Dummy {
    /// Factory for the integration registry.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the registry's factories.
    pub fn create(id: &str, config: &IntegrationConfig) -> Result<Arc<dyn Plugin>, HomectlError> {
        Ok(Arc::new(Self {
            id: id.to_string(),
            settings: config.settings.clone(),
        }))
    }
}

#[async_trait]
impl Plugin for Dummy {
    async fn register(&self, _bus: &Bus) -> Result<(), HomectlError> {
        tracing::info!(integration = %self.id, settings = ?self.settings, "registered dummy plugin");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homectl_app::bus::Router;

    #[tokio::test]
    async fn should_ignore_messages() {
        let config = IntegrationConfig {
            plugin: "dummy".to_string(),
            settings: serde_json::Map::new(),
        };
        let dummy = Dummy::create("dummy", &config).unwrap();
        let bus = Bus::new(Router::builder().build());

        dummy.register(&bus).await.unwrap();
        let reply = dummy
            .handle_msg("anything", serde_json::json!(1), &bus)
            .await
            .unwrap();

        assert_eq!(reply, serde_json::Value::Null);
    }
}
