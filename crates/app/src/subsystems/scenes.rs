//! Scenes subsystem — turns scene templates into concrete device commands.
//!
//! `getScene <name>` resolves every dynamic field of every entry against the
//! bus, expands group targets into member devices, and replies with one
//! [`DeviceCommand`] per device in template order. An unknown scene replies
//! `null`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use homectl_domain::color::Color;
use homectl_domain::device::{Brightness, DeviceCommand, DeviceState};
use homectl_domain::error::HomectlError;
use homectl_domain::path::{DevicePath, GROUPS};
use homectl_domain::scene::{Dynamic, SceneConfig, SceneDeviceTemplate, SceneTarget};
use serde::de::DeserializeOwned;

use crate::bus::{Bus, decode_payload, encode_reply};
use crate::ports::Plugin;

/// Named, templated device command sets.
pub struct Scenes {
    scenes: BTreeMap<String, SceneConfig>,
}

impl Scenes {
    #[must_use]
    pub fn new(scenes: BTreeMap<String, SceneConfig>) -> Self {
        Self { scenes }
    }

    /// Concrete commands of scene `name`, or `None` if it is not configured.
    ///
    /// # Errors
    ///
    /// Propagates failures of the bus calls resolving dynamic values and
    /// group members.
    #[tracing::instrument(skip(self, bus))]
    pub async fn get_scene(
        &self,
        name: &str,
        bus: &Bus,
    ) -> Result<Option<Vec<DeviceCommand>>, HomectlError> {
        let Some(scene) = self.scenes.get(name) else {
            tracing::warn!(scene = name, "unknown scene");
            return Ok(None);
        };

        let mut commands = Vec::new();
        for template in &scene.devices {
            let fields = ResolvedFields::resolve(template, bus).await?;
            let paths = expand_target(&template.path, bus).await?;
            commands.extend(paths.into_iter().map(|path| fields.command(path)));
        }

        Ok(Some(commands))
    }
}

/// Fields of a template with every dynamic value resolved, stamped onto
/// each expanded path.
struct ResolvedFields {
    power: bool,
    color: Option<Color>,
    brightness: Option<Brightness>,
    transition: Option<u64>,
}

impl ResolvedFields {
    async fn resolve(template: &SceneDeviceTemplate, bus: &Bus) -> Result<Self, HomectlError> {
        Ok(Self {
            power: resolve(&template.power, bus).await?,
            color: resolve_opt(template.color.as_ref(), bus).await?,
            brightness: resolve_opt(template.brightness.as_ref(), bus).await?,
            transition: resolve_opt(template.transition.as_ref(), bus).await?,
        })
    }

    fn command(&self, path: DevicePath) -> DeviceCommand {
        DeviceCommand {
            path,
            power: self.power,
            color: self.color,
            brightness: self.brightness,
            transition: self.transition,
        }
    }
}

async fn resolve<T: DeserializeOwned + Clone>(
    value: &Dynamic<T>,
    bus: &Bus,
) -> Result<T, HomectlError> {
    match value {
        Dynamic::Literal(literal) => Ok(literal.clone()),
        Dynamic::Reference(reference) => bus.send(reference.as_str(), &()).await,
    }
}

async fn resolve_opt<T: DeserializeOwned + Clone>(
    value: Option<&Dynamic<T>>,
    bus: &Bus,
) -> Result<Option<T>, HomectlError> {
    match value {
        Some(value) => resolve(value, bus).await.map(Some),
        None => Ok(None),
    }
}

async fn expand_target(target: &SceneTarget, bus: &Bus) -> Result<Vec<DevicePath>, HomectlError> {
    match target {
        SceneTarget::Device(path) => Ok(vec![path.clone()]),
        SceneTarget::Group(name) => {
            let members: Option<BTreeMap<DevicePath, DeviceState>> =
                bus.send(&format!("{GROUPS}/{name}"), &()).await?;
            Ok(members.map(|m| m.into_keys().collect()).unwrap_or_default())
        }
    }
}

#[async_trait]
impl Plugin for Scenes {
    async fn register(&self, _bus: &Bus) -> Result<(), HomectlError> {
        tracing::debug!(count = self.scenes.len(), "scenes registered");
        Ok(())
    }

    async fn handle_msg(
        &self,
        path: &str,
        payload: serde_json::Value,
        bus: &Bus,
    ) -> Result<serde_json::Value, HomectlError> {
        match path {
            "getScene" => {
                let name: String = decode_payload(path, payload)?;
                let commands = self.get_scene(&name, bus).await?;
                encode_reply(path, &commands)
            }
            _ => {
                tracing::warn!(path, "unknown scenes command");
                Ok(serde_json::Value::Null)
            }
        }
    }
}
