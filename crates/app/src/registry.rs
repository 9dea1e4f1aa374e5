//! Integration registry — compile-time mapping from plugin identifier to
//! constructor.
//!
//! The daemon fills the registry with the integrations it was built with;
//! configuration then selects among them by `plugin = "<identifier>"`.

use std::collections::BTreeMap;
use std::sync::Arc;

use homectl_domain::error::HomectlError;
use homectl_domain::integration::IntegrationConfig;

use crate::ports::Plugin;

/// Builds an integration instance for id `id` from its config slice.
///
/// Implementations validate the config and fail with
/// [`HomectlError::InvalidConfig`].
pub type IntegrationFactory =
    fn(id: &str, config: &IntegrationConfig) -> Result<Arc<dyn Plugin>, HomectlError>;

/// Known integration plugins.
#[derive(Default, Clone)]
pub struct IntegrationRegistry {
    factories: BTreeMap<&'static str, IntegrationFactory>,
}

impl IntegrationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin under `identifier`, replacing any previous one.
    #[must_use]
    pub fn with(mut self, identifier: &'static str, factory: IntegrationFactory) -> Self {
        self.factories.insert(identifier, factory);
        self
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Instantiate the plugin selected by `config.plugin`.
    ///
    /// # Errors
    ///
    /// Returns [`HomectlError::UnknownPlugin`] when nothing is registered
    /// under that identifier, or the factory's own error.
    pub fn create(
        &self,
        id: &str,
        config: &IntegrationConfig,
    ) -> Result<Arc<dyn Plugin>, HomectlError> {
        let factory =
            self.factories
                .get(config.plugin.as_str())
                .ok_or_else(|| HomectlError::UnknownPlugin {
                    id: id.to_string(),
                    plugin: config.plugin.clone(),
                })?;
        factory(id, config)
    }
}
