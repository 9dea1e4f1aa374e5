//! Random — a source of random data, mostly useful for debugging scenes.

use std::sync::Arc;

use async_trait::async_trait;
use homectl_app::bus::{Bus, encode_reply};
use homectl_app::ports::Plugin;
use homectl_domain::color::Color;
use homectl_domain::error::HomectlError;
use homectl_domain::integration::IntegrationConfig;
use palette::Srgb;
use rand::Rng;

/// Replies to `color` with a uniformly random sRGB color in canonical form.
pub struct Random {
    id: String,
}

impl Random {
    /// Factory for the integration registry.
    ///
    /// # Errors
    ///
    /// Never fails; the plugin takes no settings.
    pub fn create(id: &str, _config: &IntegrationConfig) -> Result<Arc<dyn Plugin>, HomectlError> {
        Ok(Arc::new(Self { id: id.to_string() }))
    }
}

fn random_color() -> Color {
    let mut rng = rand::thread_rng();
    Color::from_srgb(Srgb::new(rng.r#gen(), rng.r#gen(), rng.r#gen()))
}

#[async_trait]
impl Plugin for Random {
    async fn register(&self, _bus: &Bus) -> Result<(), HomectlError> {
        tracing::debug!(integration = %self.id, "registered random plugin");
        Ok(())
    }

    async fn handle_msg(
        &self,
        path: &str,
        _payload: serde_json::Value,
        _bus: &Bus,
    ) -> Result<serde_json::Value, HomectlError> {
        match path {
            "color" => encode_reply(path, &random_color()),
            _ => {
                tracing::warn!(integration = %self.id, path, "unknown random command");
                Ok(serde_json::Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homectl_app::bus::Router;

    #[tokio::test]
    async fn should_reply_with_canonical_color() {
        let config = IntegrationConfig {
            plugin: "random".to_string(),
            settings: serde_json::Map::new(),
        };
        let random = Random::create("random", &config).unwrap();
        let bus = Bus::new(Router::builder().build());

        for _ in 0..20 {
            let reply = random
                .handle_msg("color", serde_json::Value::Null, &bus)
                .await
                .unwrap();
            let text = reply.as_str().unwrap();
            let color = Color::parse(text).unwrap();
            assert_eq!(color.to_string(), text);
        }
    }
}
