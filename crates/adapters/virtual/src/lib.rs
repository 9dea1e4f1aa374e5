//! # homectl-adapter-virtual
//!
//! Integrations that run entirely in process, for testing, demonstration
//! and as dynamic value sources for scenes.
//!
//! ## Provided plugins
//!
//! | Identifier | Behaviour |
//! |------------|-----------|
//! | `dummy` | Logs its registration and nothing else |
//! | `dummy_devices` | Simulated lights and sensors; records commands, optionally polls its state back |
//! | `random` | `color` replies with a random color |
//! | `circadian` | `color` replies with a day/night blend for the current local time |
//!
//! ## Dependency rule
//!
//! Depends on `homectl-app` (plugin port, bus) and `homectl-domain` only.

mod circadian;
mod dummy;
mod dummy_devices;
mod poller;
mod random;

pub use circadian::{Circadian, CircadianConfig, night_fade};
pub use dummy::Dummy;
pub use dummy_devices::{DummyDevices, DummyDevicesConfig};
pub use random::Random;

use homectl_app::registry::IntegrationRegistry;

/// Add every plugin of this crate to `registry`.
#[must_use]
pub fn register(registry: IntegrationRegistry) -> IntegrationRegistry {
    registry
        .with("dummy", Dummy::create)
        .with("dummy_devices", DummyDevices::create)
        .with("random", Random::create)
        .with("circadian", Circadian::create)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_register_every_plugin() {
        let registry = register(IntegrationRegistry::new());
        assert_eq!(
            registry.identifiers().collect::<Vec<_>>(),
            vec!["circadian", "dummy", "dummy_devices", "random"]
        );
    }
}
