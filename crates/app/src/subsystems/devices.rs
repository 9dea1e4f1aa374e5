//! Devices subsystem — wished state, reconciliation and batched dispatch.
//!
//! Holds one [`DeviceState`] per canonical [`DevicePath`]. Every change goes
//! through [`DeviceState::compose`]; outbound commands are grouped by owning
//! integration so each integration receives a single batched message.
//!
//! ## Messages
//!
//! | Path | Payload | Reply |
//! |------|---------|-------|
//! | `getDevices` | — | map of path to [`DeviceState`] |
//! | `registerDevice` | [`DiscoveredState`] | — |
//! | `discoveredState` | [`DiscoveredState`] | — |
//! | `activateScene` | scene name | — |
//! | `adjustBrightness` | `[path, rate]` | — |
//! | `applyDeviceCommands` | list of [`DeviceCommand`] | — |
//! | `expandPath` | path | list of device paths |
//!
//! Any other path is relayed verbatim to `integrations/<path>`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use homectl_domain::device::{DeviceCommand, DeviceState, DiscoveredState, SceneActivation};
use homectl_domain::error::{HomectlError, ValidationError};
use homectl_domain::path::{DevicePath, INTEGRATIONS, group_name};
use homectl_domain::time::{ADJUST_TRANSITION_MS, now};
use serde::{Deserialize, Serialize};

use super::lock;
use crate::bus::{Bus, decode_payload, encode_reply};
use crate::ports::Plugin;

/// Relative brightness change, as a number or a numeric string.
///
/// Routine actions pass their arguments as strings, hence the second form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rate {
    Number(f64),
    Text(String),
}

impl Rate {
    /// Numeric value of the rate.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRate`] for a non-numeric string or a
    /// non-finite value.
    pub fn value(&self) -> Result<f64, ValidationError> {
        match self {
            Self::Number(n) if n.is_finite() => Ok(*n),
            Self::Number(n) => Err(ValidationError::InvalidRate(n.to_string())),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| ValidationError::InvalidRate(s.clone())),
        }
    }
}

/// The reconciliation engine.
#[derive(Default)]
pub struct Devices {
    devices: Mutex<BTreeMap<DevicePath, DeviceState>>,
}

impl Devices {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record.
    #[must_use]
    pub fn get_devices(&self) -> BTreeMap<DevicePath, DeviceState> {
        lock(&self.devices).clone()
    }

    /// Stored record of one device.
    #[must_use]
    pub fn get_device(&self, path: &DevicePath) -> Option<DeviceState> {
        lock(&self.devices).get(path).cloned()
    }

    /// Create a record from the observed fields over the static defaults.
    ///
    /// A device that already has a record keeps it.
    pub fn register_device(&self, observed: &DiscoveredState) {
        let mut devices = lock(&self.devices);
        if devices.contains_key(&observed.path) {
            tracing::debug!(path = %observed.path, "device already registered");
            return;
        }
        devices.insert(observed.path.clone(), DeviceState::discovered(observed));
        tracing::info!(path = %observed.path, power = observed.power, "discovered device");
    }

    /// Compose and store the next record for `cmd.path`.
    pub fn apply_device_command(
        &self,
        cmd: &DeviceCommand,
        scene: Option<&SceneActivation>,
    ) -> DeviceState {
        let mut devices = lock(&self.devices);
        let state = DeviceState::compose(devices.get(&cmd.path), scene, cmd);
        devices.insert(cmd.path.clone(), state.clone());
        state
    }

    /// Apply every command, then dispatch the resulting records.
    ///
    /// # Errors
    ///
    /// Propagates fatal dispatch errors.
    pub async fn apply_device_commands(
        &self,
        cmds: &[DeviceCommand],
        scene: Option<&SceneActivation>,
        bus: &Bus,
    ) -> Result<(), HomectlError> {
        for cmd in cmds {
            self.apply_device_command(cmd, scene);
        }
        self.dispatch(cmds.iter().map(|cmd| &cmd.path), bus).await
    }

    /// Apply every command of scene `name` and dispatch them.
    ///
    /// # Errors
    ///
    /// Propagates failures of `scenes/getScene` and fatal dispatch errors.
    #[tracing::instrument(skip(self, bus))]
    pub async fn activate_scene(&self, name: &str, bus: &Bus) -> Result<(), HomectlError> {
        let commands: Option<Vec<DeviceCommand>> = bus.send("scenes/getScene", name).await?;
        let Some(commands) = commands else {
            tracing::warn!(scene = name, "cannot activate unknown scene");
            return Ok(());
        };

        tracing::info!(scene = name, devices = commands.len(), "activating scene");
        let activation = SceneActivation::activate(name, now());
        self.apply_device_commands(&commands, Some(&activation), bus)
            .await
    }

    /// Reconcile an observed state against the wished one.
    ///
    /// Unknown devices are registered from the observation. Otherwise, when
    /// a scene is active its command for this device is replayed (keeping
    /// brightness), and a mismatch between the wished and observed state
    /// triggers one corrective dispatch.
    ///
    /// # Errors
    ///
    /// Propagates failures of `scenes/getScene` and fatal dispatch errors.
    #[tracing::instrument(skip(self, observed, bus), fields(path = %observed.path))]
    pub async fn discovered_state(
        &self,
        observed: &DiscoveredState,
        bus: &Bus,
    ) -> Result<(), HomectlError> {
        let Some(stored) = self.get_device(&observed.path) else {
            self.register_device(observed);
            return Ok(());
        };

        let wished = match stored.scene.clone() {
            Some(scene) => self
                .replay_scene(&scene, &stored, &observed.path, bus)
                .await?
                .unwrap_or(stored),
            None => stored,
        };

        if wished.matches(observed) {
            return Ok(());
        }

        tracing::info!(
            wished_power = wished.power,
            wished_color = ?wished.effective_color().map(|c| c.to_string()),
            observed_power = observed.power,
            observed_color = ?observed.color.map(|c| c.to_string()),
            "device drifted from wished state, correcting"
        );
        self.dispatch([&observed.path], bus).await
    }

    /// Re-derive the record of `path` from the last matching entry of its
    /// active scene. `None` when the scene no longer covers the device.
    async fn replay_scene(
        &self,
        scene: &str,
        stored: &DeviceState,
        path: &DevicePath,
        bus: &Bus,
    ) -> Result<Option<DeviceState>, HomectlError> {
        let commands: Option<Vec<DeviceCommand>> = bus.send("scenes/getScene", scene).await?;
        let Some(cmd) = commands.and_then(|cmds| cmds.into_iter().rev().find(|c| c.path == *path))
        else {
            return Ok(None);
        };

        let activated_at = stored.scene_activation_time.unwrap_or_else(now);
        let activation = SceneActivation::replay(scene, activated_at);
        Ok(Some(self.apply_device_command(&cmd, Some(&activation))))
    }

    /// Shift the brightness of every device under `path` by `rate`.
    ///
    /// # Errors
    ///
    /// Propagates path expansion failures and fatal dispatch errors.
    #[tracing::instrument(skip(self, bus))]
    pub async fn adjust_brightness(
        &self,
        path: &str,
        rate: f64,
        bus: &Bus,
    ) -> Result<(), HomectlError> {
        let mut adjusted = Vec::new();
        for device in self.expand_path(path, bus).await? {
            let Some(current) = self.get_device(&device) else {
                tracing::info!(path = %device, "cannot adjust brightness of unknown device");
                continue;
            };
            let cmd = DeviceCommand {
                path: device,
                power: current.power,
                color: None,
                brightness: Some(current.brightness.adjust(rate)),
                transition: Some(ADJUST_TRANSITION_MS),
            };
            self.apply_device_command(&cmd, None);
            adjusted.push(cmd.path);
        }
        self.dispatch(&adjusted, bus).await
    }

    /// Concrete device paths denoted by `path`.
    ///
    /// A group path expands to its members in canonical order; any other
    /// path must be a device path.
    ///
    /// # Errors
    ///
    /// Returns [`HomectlError::Validation`] for a path that is neither, and
    /// propagates failures of the group query.
    pub async fn expand_path(&self, path: &str, bus: &Bus) -> Result<Vec<DevicePath>, HomectlError> {
        if group_name(path).is_none() {
            return Ok(vec![DevicePath::parse(path)?]);
        }
        let members: Option<BTreeMap<DevicePath, DeviceState>> = bus.send(path, &()).await?;
        Ok(members.map(|m| m.into_keys().collect()).unwrap_or_default())
    }

    /// Send the stored records of `paths` to their integrations, one batch
    /// per integration. Duplicate paths are sent once.
    ///
    /// A recoverable failure of one batch is logged and the remaining
    /// batches are still sent.
    async fn dispatch<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a DevicePath>,
        bus: &Bus,
    ) -> Result<(), HomectlError> {
        let batches = self.batches(paths);

        for (integration, commands) in batches {
            let target = format!("{INTEGRATIONS}/{integration}");
            tracing::debug!(integration = %integration, count = commands.len(), "dispatching batch");
            match bus.emit(&target, &commands).await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::warn!(%err, integration = %integration, "failed to dispatch commands");
                }
            }
        }
        Ok(())
    }

    fn batches<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a DevicePath>,
    ) -> BTreeMap<String, Vec<DeviceCommand>> {
        let devices = lock(&self.devices);
        let mut batches: BTreeMap<String, Vec<DeviceCommand>> = BTreeMap::new();

        for path in paths {
            let Some(state) = devices.get(path) else {
                continue;
            };
            let batch = batches.entry(path.integration().to_string()).or_default();
            if batch.iter().all(|cmd| cmd.path != *path) {
                batch.push(state.to_command(path.clone()));
            }
        }
        batches
    }
}

#[async_trait]
impl Plugin for Devices {
    async fn register(&self, _bus: &Bus) -> Result<(), HomectlError> {
        tracing::debug!("devices registered");
        Ok(())
    }

    async fn handle_msg(
        &self,
        path: &str,
        payload: serde_json::Value,
        bus: &Bus,
    ) -> Result<serde_json::Value, HomectlError> {
        match path {
            "getDevices" => encode_reply(path, &self.get_devices()),
            "registerDevice" => {
                let observed: DiscoveredState = decode_payload(path, payload)?;
                self.register_device(&observed);
                Ok(serde_json::Value::Null)
            }
            "discoveredState" => {
                let observed: DiscoveredState = decode_payload(path, payload)?;
                self.discovered_state(&observed, bus).await?;
                Ok(serde_json::Value::Null)
            }
            "activateScene" => {
                let name: String = decode_payload(path, payload)?;
                self.activate_scene(&name, bus).await?;
                Ok(serde_json::Value::Null)
            }
            "adjustBrightness" => {
                let (target, rate): (String, Rate) = decode_payload(path, payload)?;
                self.adjust_brightness(&target, rate.value()?, bus).await?;
                Ok(serde_json::Value::Null)
            }
            "applyDeviceCommands" => {
                let cmds: Vec<DeviceCommand> = decode_payload(path, payload)?;
                self.apply_device_commands(&cmds, None, bus).await?;
                Ok(serde_json::Value::Null)
            }
            "expandPath" => {
                let target: String = decode_payload(path, payload)?;
                let paths = self.expand_path(&target, bus).await?;
                encode_reply(path, &paths)
            }
            other => {
                tracing::debug!(path = other, "relaying to integrations");
                bus.send_value(&format!("{INTEGRATIONS}/{other}"), payload)
                    .await
            }
        }
    }
}
