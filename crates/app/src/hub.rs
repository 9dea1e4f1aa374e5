//! Hub runtime — builds the subsystems and drives their lifecycle.
//!
//! 1. [`Hub::new`] constructs every subsystem and integration, validating
//!    configuration
//! 2. [`Hub::start`] calls `register` on every subsystem in order, then
//!    `start` on every subsystem
//! 3. [`Hub::shutdown`] calls `stop` in reverse order
//!
//! The hub owns only the router; each subsystem owns its own state.

use std::collections::BTreeMap;
use std::sync::Arc;

use homectl_domain::error::HomectlError;
use homectl_domain::group::GroupConfig;
use homectl_domain::path::{DEVICES, GROUPS, INTEGRATIONS, ROUTINES, SCENES};
use homectl_domain::routine::RoutineConfig;
use homectl_domain::scene::SceneConfig;
use serde::Deserialize;

use crate::bus::{Bus, DEFAULT_MAX_CALL_DEPTH, Router};
use crate::ports::Plugin;
use crate::registry::IntegrationRegistry;
use crate::subsystems::{Devices, Groups, Integrations, Routines, Scenes};

/// Static configuration of a hub.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub max_call_depth: usize,
    /// Integration id to config slice, in declaration order.
    pub integrations: serde_json::Map<String, serde_json::Value>,
    pub groups: BTreeMap<String, GroupConfig>,
    pub scenes: BTreeMap<String, SceneConfig>,
    pub routines: BTreeMap<String, RoutineConfig>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            integrations: serde_json::Map::new(),
            groups: BTreeMap::new(),
            scenes: BTreeMap::new(),
            routines: BTreeMap::new(),
        }
    }
}

/// A constructed set of subsystems wired to one router.
pub struct Hub {
    router: Arc<Router>,
    devices: Arc<Devices>,
    routines: Arc<Routines>,
}

impl Hub {
    /// Construct every subsystem and integration.
    ///
    /// # Errors
    ///
    /// Returns a fatal configuration error ([`HomectlError::InvalidConfig`]
    /// or [`HomectlError::UnknownPlugin`]).
    pub fn new(config: HubConfig, registry: &IntegrationRegistry) -> Result<Self, HomectlError> {
        let devices = Arc::new(Devices::new());
        let groups = Arc::new(Groups::new(&config.groups)?);
        let scenes = Arc::new(Scenes::new(config.scenes));
        let routines = Arc::new(Routines::new(config.routines));
        let integrations = Arc::new(Integrations::new(&config.integrations, registry)?);

        let router = Router::builder()
            .max_call_depth(config.max_call_depth)
            .register(DEVICES, Arc::clone(&devices) as Arc<dyn Plugin>)
            .register(GROUPS, groups)
            .register(SCENES, scenes)
            .register(ROUTINES, Arc::clone(&routines) as Arc<dyn Plugin>)
            .register(INTEGRATIONS, integrations)
            .build();

        Ok(Self {
            router,
            devices,
            routines,
        })
    }

    /// Register, then start, every subsystem.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a subsystem's `register` or `start`.
    pub async fn start(&self) -> Result<(), HomectlError> {
        let bus = self.bus();

        for (name, subsystem) in self.router.subsystems() {
            tracing::debug!(subsystem = name, "registering");
            subsystem.register(&bus).await?;
        }
        for (name, subsystem) in self.router.subsystems() {
            tracing::debug!(subsystem = name, "starting");
            subsystem.start(&bus).await?;
        }

        tracing::info!("hub started");
        Ok(())
    }

    /// Stop every subsystem in reverse registration order.
    pub async fn shutdown(&self) {
        for (name, subsystem) in self.router.subsystems().rev() {
            tracing::debug!(subsystem = name, "stopping");
            subsystem.stop().await;
        }
        tracing::info!("hub stopped");
    }

    /// A root bus handle.
    #[must_use]
    pub fn bus(&self) -> Bus {
        Bus::new(Arc::clone(&self.router))
    }

    #[must_use]
    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    #[must_use]
    pub fn routines(&self) -> &Routines {
        &self.routines
    }

    /// Resolve once a fatal error has been raised on the bus, with its
    /// rendered message.
    pub async fn wait_fatal(&self) -> Option<String> {
        let mut signal = self.router.fatal_signal();
        signal
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|fatal| fatal.clone())
    }
}
