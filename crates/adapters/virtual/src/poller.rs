//! Background poll loop reporting simulated device state to the hub.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use homectl_app::bus::Bus;
use homectl_domain::device::DiscoveredState;
use homectl_domain::error::HomectlError;
use homectl_domain::path::DevicePath;
use tokio::task::JoinHandle;

/// Observed state of simulated devices, shared with the poll loop.
pub(crate) type SimulatedDevices = Arc<Mutex<BTreeMap<DevicePath, DiscoveredState>>>;

pub(crate) struct Poller {
    bus: Bus,
    devices: SimulatedDevices,
    interval: Duration,
}

impl Poller {
    /// Spawn the loop. It runs until the returned handle is aborted.
    pub(crate) fn start(bus: Bus, devices: SimulatedDevices, interval: Duration) -> JoinHandle<()> {
        let poller = Self {
            bus,
            devices,
            interval,
        };
        tokio::spawn(poller.run())
    }

    /// Poll, wait for the interval, repeat. The next run is only scheduled
    /// once the current one has finished.
    async fn run(self) {
        loop {
            if let Err(err) = self.iterate().await {
                tracing::warn!(%err, "dummy device poll failed, retrying next interval");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    async fn iterate(&self) -> Result<(), HomectlError> {
        let observed: Vec<DiscoveredState> = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for state in &observed {
            self.bus.emit("devices/discoveredState", state).await?;
        }
        Ok(())
    }
}
