//! Dummy devices — simulated lights and sensors.
//!
//! Each configured device starts powered off and takes on whatever state the
//! hub commands. Every received batch is recorded and logged. Sensor values
//! sent to `integrations/<id>/<sensor>` are forwarded to the routines
//! subsystem as `valueChange`.
//!
//! ## Messages
//!
//! | Path | Payload | Reply |
//! |------|---------|-------|
//! | (empty) | list of [`DeviceCommand`] | — |
//! | `<sensor>` | sensor value | — |
//! | `getState` | — | observed state per device |
//! | `getBatches` | — | every batch received so far |

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use homectl_app::bus::{Bus, decode_payload, encode_reply};
use homectl_app::ports::Plugin;
use homectl_domain::device::{DeviceCommand, DiscoveredState};
use homectl_domain::error::HomectlError;
use homectl_domain::integration::IntegrationConfig;
use homectl_domain::path::{DEVICES, DevicePath, INTEGRATIONS};
use homectl_domain::routine::SensorUpdate;
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::poller::{Poller, SimulatedDevices};

/// Settings of a dummy devices integration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DummyDevicesConfig {
    /// Device ids, addressed as `devices/<integration>/<id>`.
    pub devices: Vec<String>,
    /// Sensor ids, addressed as `integrations/<integration>/<id>`.
    #[serde(default)]
    pub sensors: Vec<String>,
    /// When set, the observed state is reported back at this interval.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

/// Simulated devices and sensors.
pub struct DummyDevices {
    id: String,
    config: DummyDevicesConfig,
    devices: SimulatedDevices,
    batches: Mutex<Vec<Vec<DeviceCommand>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl DummyDevices {
    /// Factory for the integration registry.
    ///
    /// # Errors
    ///
    /// Returns [`HomectlError::InvalidConfig`] for malformed settings or a
    /// device id that does not form a valid device path.
    pub fn create(id: &str, config: &IntegrationConfig) -> Result<Arc<dyn Plugin>, HomectlError> {
        Ok(Arc::new(Self::new(id, config.decode(id)?)?))
    }

    /// Build the integration with every device powered off.
    ///
    /// # Errors
    ///
    /// Returns [`HomectlError::InvalidConfig`] for an invalid device id.
    pub fn new(id: &str, config: DummyDevicesConfig) -> Result<Self, HomectlError> {
        let devices = config
            .devices
            .iter()
            .map(|device| {
                let path = DevicePath::parse(&format!("{DEVICES}/{id}/{device}"))
                    .map_err(|err| HomectlError::invalid_config(format!("{INTEGRATIONS}/{id}"), err))?;
                let state = DiscoveredState {
                    path: path.clone(),
                    power: false,
                    color: None,
                };
                Ok((path, state))
            })
            .collect::<Result<BTreeMap<_, _>, HomectlError>>()?;

        Ok(Self {
            id: id.to_string(),
            config,
            devices: Arc::new(Mutex::new(devices)),
            batches: Mutex::default(),
            poller: Mutex::default(),
        })
    }

    /// Current simulated state of every device.
    #[must_use]
    pub fn state(&self) -> Vec<DiscoveredState> {
        lock(&self.devices).values().cloned().collect()
    }

    /// Every batch received so far, oldest first.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<DeviceCommand>> {
        lock(&self.batches).clone()
    }

    /// Apply a batch. Commands for devices this integration does not own are
    /// skipped and reported as an integration error once the rest applied.
    fn apply(&self, commands: Vec<DeviceCommand>) -> Result<(), HomectlError> {
        let mut unknown = Vec::new();
        {
            let mut devices = lock(&self.devices);
            for cmd in &commands {
                let Some(device) = devices.get_mut(&cmd.path) else {
                    unknown.push(cmd.path.to_string());
                    continue;
                };
                device.power = cmd.power;
                device.color = cmd.color;
                tracing::info!(
                    path = %cmd.path,
                    power = cmd.power,
                    color = ?cmd.color.map(|c| c.to_string()),
                    "dummy device updated"
                );
            }
        }
        lock(&self.batches).push(commands);

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(HomectlError::Integration(
                format!("no such device: {}", unknown.join(", ")).into(),
            ))
        }
    }

    fn sensor_path(&self, sensor: &str) -> String {
        format!("{INTEGRATIONS}/{}/{sensor}", self.id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Plugin for DummyDevices {
    async fn register(&self, _bus: &Bus) -> Result<(), HomectlError> {
        tracing::info!(
            integration = %self.id,
            devices = self.config.devices.len(),
            sensors = self.config.sensors.len(),
            "registered dummy devices plugin"
        );
        Ok(())
    }

    async fn start(&self, bus: &Bus) -> Result<(), HomectlError> {
        for state in self.state() {
            bus.emit("devices/registerDevice", &state).await?;
        }
        for sensor in &self.config.sensors {
            bus.emit("routines/registerSensor", &self.sensor_path(sensor))
                .await?;
        }

        if let Some(interval_ms) = self.config.poll_interval_ms {
            let root = Bus::new(Arc::clone(bus.router()));
            let handle = Poller::start(
                root,
                Arc::clone(&self.devices),
                Duration::from_millis(interval_ms),
            );
            if let Some(previous) = lock(&self.poller).replace(handle) {
                previous.abort();
            }
            tracing::info!(integration = %self.id, interval_ms, "dummy device poller started");
        }
        Ok(())
    }

    async fn handle_msg(
        &self,
        path: &str,
        payload: serde_json::Value,
        bus: &Bus,
    ) -> Result<serde_json::Value, HomectlError> {
        match path {
            "" => {
                let commands: Vec<DeviceCommand> = decode_payload(&self.id, payload)?;
                self.apply(commands)?;
                Ok(serde_json::Value::Null)
            }
            "getState" => encode_reply(path, &self.state()),
            "getBatches" => encode_reply(path, &self.batches()),
            sensor if self.config.sensors.iter().any(|s| s == sensor) => {
                let update = SensorUpdate {
                    path: self.sensor_path(sensor),
                    value: payload,
                };
                bus.emit("routines/valueChange", &update).await?;
                Ok(serde_json::Value::Null)
            }
            _ => {
                tracing::warn!(integration = %self.id, path, "unknown dummy devices command");
                Ok(serde_json::Value::Null)
            }
        }
    }

    async fn stop(&self) {
        if let Some(handle) = lock(&self.poller).take() {
            handle.abort();
            tracing::debug!(integration = %self.id, "dummy device poller aborted");
        }
    }
}
