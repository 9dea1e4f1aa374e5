//! Integration configuration — which plugin backs an integration id.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::HomectlError;

/// Configuration slice for one integration instance.
///
/// `plugin` selects the implementation; every other key is handed to the
/// plugin, which validates it against its own schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub plugin: String,
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl IntegrationConfig {
    /// Decode the plugin-specific settings into the plugin's config type.
    ///
    /// # Errors
    ///
    /// Returns [`HomectlError::InvalidConfig`] naming the integration `id`
    /// when the settings do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self, id: &str) -> Result<T, HomectlError> {
        serde_json::from_value(serde_json::Value::Object(self.settings.clone()))
            .map_err(|err| HomectlError::invalid_config(format!("integrations/{id}"), err))
    }
}
