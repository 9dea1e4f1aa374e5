//! Routines subsystem — edge-triggered rules over sensor values.
//!
//! Owns the sensor table (path to last known value). On `valueChange`, every
//! routine watching the updated sensor is evaluated against the table before
//! and after the update; routines whose conditions become satisfied by this
//! update fire, the update is committed, then the actions run.
//!
//! The commit happens before the actions, not after them. An action that
//! feeds a value for the same sensor back into `valueChange` therefore sees
//! the committed table and cannot re-trigger the routine.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use homectl_domain::error::HomectlError;
use homectl_domain::routine::{Evaluation, RoutineConfig, SensorUpdate, evaluate};

use super::lock;
use crate::bus::{Bus, decode_payload};
use crate::ports::Plugin;

/// Edge-triggered rule engine.
pub struct Routines {
    routines: BTreeMap<String, RoutineConfig>,
    sensors: Mutex<HashMap<String, serde_json::Value>>,
    known_sensors: Mutex<BTreeSet<String>>,
}

impl Routines {
    #[must_use]
    pub fn new(routines: BTreeMap<String, RoutineConfig>) -> Self {
        for (name, routine) in &routines {
            if routine.when.is_empty() {
                tracing::warn!(routine = %name, "routine without conditions never fires");
            }
        }
        Self {
            routines,
            sensors: Mutex::default(),
            known_sensors: Mutex::default(),
        }
    }

    /// Last known value of a sensor.
    #[must_use]
    pub fn sensor_value(&self, path: &str) -> Option<serde_json::Value> {
        lock(&self.sensors).get(path).cloned()
    }

    /// Record a sensor announced by an integration.
    pub fn register_sensor(&self, path: &str) {
        if lock(&self.known_sensors).insert(path.to_string()) {
            tracing::info!(path, "discovered sensor");
        }
    }

    /// Apply a sensor update and fire every routine it satisfies.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error raised by an action. Recoverable action
    /// failures are logged and the remaining actions still run.
    #[tracing::instrument(skip(self, update, bus), fields(path = %update.path))]
    pub async fn value_change(&self, update: SensorUpdate, bus: &Bus) -> Result<(), HomectlError> {
        let firing = self.commit(update);

        for name in firing {
            let Some(routine) = self.routines.get(name) else {
                continue;
            };
            tracing::info!(routine = name, "routine triggered");
            for action in &routine.actions {
                match bus.send_value(&action.path, action.payload()).await {
                    Ok(_) => {}
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        tracing::warn!(%err, routine = name, action = %action, "routine action failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Decide which routines rise with `update`, then store it.
    fn commit(&self, update: SensorUpdate) -> Vec<&str> {
        let mut sensors = lock(&self.sensors);
        let mut next = sensors.clone();
        next.insert(update.path.clone(), update.value);

        let firing = self
            .routines
            .iter()
            .filter(|(_, routine)| routine.references(&update.path))
            .filter(|(name, routine)| {
                let was = evaluate(&routine.when, &sensors);
                if let Evaluation::UnknownSensor(sensor) = &was {
                    tracing::debug!(routine = %name, sensor = %sensor, "sensor has no value yet");
                }
                !was.is_satisfied() && evaluate(&routine.when, &next).is_satisfied()
            })
            .map(|(name, _)| name.as_str())
            .collect();

        *sensors = next;
        firing
    }
}

#[async_trait]
impl Plugin for Routines {
    async fn register(&self, _bus: &Bus) -> Result<(), HomectlError> {
        tracing::debug!(count = self.routines.len(), "routines registered");
        Ok(())
    }

    async fn handle_msg(
        &self,
        path: &str,
        payload: serde_json::Value,
        bus: &Bus,
    ) -> Result<serde_json::Value, HomectlError> {
        match path {
            "valueChange" => {
                let update: SensorUpdate = decode_payload(path, payload)?;
                self.value_change(update, bus).await?;
            }
            "registerSensor" => {
                let sensor: String = decode_payload(path, payload)?;
                self.register_sensor(&sensor);
            }
            _ => tracing::warn!(path, "unknown routines command"),
        }
        Ok(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::testing::{Recorder, bus};
    use serde_json::json;
    use std::sync::Arc;

    const MOTION: &str = "integrations/dummy/motion";

    fn routines(entries: serde_json::Value) -> Arc<Routines> {
        let config: BTreeMap<String, RoutineConfig> = serde_json::from_value(entries).unwrap();
        Arc::new(Routines::new(config))
    }

    fn fixture(entries: serde_json::Value) -> (Arc<Routines>, Arc<Recorder>, Bus) {
        let routines = routines(entries);
        let devices = Arc::new(Recorder::default());
        let bus = bus(vec![
            ("routines", Arc::clone(&routines) as Arc<dyn Plugin>),
            ("devices", Arc::clone(&devices) as Arc<dyn Plugin>),
        ]);
        (routines, devices, bus)
    }

    async fn update(bus: &Bus, path: &str, value: serde_json::Value) {
        let update = SensorUpdate {
            path: path.to_string(),
            value,
        };
        bus.emit("routines/valueChange", &update).await.unwrap();
    }

    fn motion_routine() -> serde_json::Value {
        json!({
            "motion": {
                "when": [{ "path": MOTION, "is": "high" }],
                "do": ["devices/activateScene evening"]
            }
        })
    }

    #[tokio::test]
    async fn should_fire_once_per_rising_edge() {
        let (_, devices, bus) = fixture(motion_routine());

        update(&bus, MOTION, json!("low")).await;
        update(&bus, MOTION, json!("high")).await;
        assert_eq!(devices.messages().len(), 1);

        update(&bus, MOTION, json!("high")).await;
        assert_eq!(devices.messages().len(), 1);

        update(&bus, MOTION, json!("low")).await;
        update(&bus, MOTION, json!("high")).await;
        assert_eq!(
            devices.messages(),
            vec![
                ("activateScene".to_string(), json!("evening")),
                ("activateScene".to_string(), json!("evening")),
            ]
        );
    }

    #[tokio::test]
    async fn should_fire_when_first_value_satisfies() {
        let (routines, devices, bus) = fixture(motion_routine());

        update(&bus, MOTION, json!("high")).await;

        assert_eq!(devices.messages().len(), 1);
        assert_eq!(routines.sensor_value(MOTION), Some(json!("high")));
    }

    #[tokio::test]
    async fn should_wait_for_every_condition() {
        let (_, devices, bus) = fixture(json!({
            "armed_motion": {
                "when": [
                    { "path": MOTION, "is": true },
                    { "path": "integrations/alarm/state", "is": "ARMED" }
                ],
                "do": ["devices/adjustBrightness groups/living -0.2"]
            }
        }));

        update(&bus, MOTION, json!(true)).await;
        assert!(devices.messages().is_empty());

        update(&bus, "integrations/alarm/state", json!("ARMED")).await;
        assert_eq!(
            devices.messages(),
            vec![("adjustBrightness".to_string(), json!(["groups/living", "-0.2"]))]
        );
    }

    #[tokio::test]
    async fn should_ignore_updates_of_unreferenced_sensors() {
        let (routines, devices, bus) = fixture(motion_routine());

        update(&bus, "integrations/dummy/door", json!("high")).await;

        assert!(devices.messages().is_empty());
        assert_eq!(
            routines.sensor_value("integrations/dummy/door"),
            Some(json!("high"))
        );
    }

    #[tokio::test]
    async fn should_run_remaining_actions_when_one_fails() {
        let (_, devices, bus) = fixture(json!({
            "motion": {
                "when": [{ "path": MOTION, "is": 1 }],
                "do": ["routines/valueChange not-an-update", "devices/activateScene evening"]
            }
        }));

        update(&bus, MOTION, json!(1)).await;

        assert_eq!(devices.messages().len(), 1);
        assert!(bus.router().fatal_error().is_none());
    }

    /// Reports the motion sensor as high again for every message received.
    struct Retrigger {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Plugin for Retrigger {
        async fn register(&self, _bus: &Bus) -> Result<(), HomectlError> {
            Ok(())
        }

        async fn handle_msg(
            &self,
            _path: &str,
            _payload: serde_json::Value,
            bus: &Bus,
        ) -> Result<serde_json::Value, HomectlError> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let update = SensorUpdate {
                path: MOTION.to_string(),
                value: json!("high"),
            };
            bus.emit("routines/valueChange", &update).await?;
            Ok(serde_json::Value::Null)
        }
    }

    #[tokio::test]
    async fn should_not_retrigger_when_action_reports_same_sensor() {
        let routines = routines(motion_routine());
        let devices = Arc::new(Retrigger {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let bus = bus(vec![
            ("routines", Arc::clone(&routines) as Arc<dyn Plugin>),
            ("devices", Arc::clone(&devices) as Arc<dyn Plugin>),
        ]);

        update(&bus, MOTION, json!("high")).await;

        assert_eq!(devices.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(bus.router().fatal_error().is_none());
    }

    #[tokio::test]
    async fn should_record_registered_sensor_without_value() {
        let (routines, _, bus) = fixture(motion_routine());

        bus.emit("routines/registerSensor", MOTION).await.unwrap();

        assert_eq!(routines.sensor_value(MOTION), None);
        assert!(lock(&routines.known_sensors).contains(MOTION));
    }
}
