//! Groups subsystem — resolves `groups/<name>` to the matching devices.
//!
//! The reply carries full device records, keyed by canonical path, so the
//! caller does not need a second round trip to `devices/getDevices`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use homectl_domain::device::DeviceState;
use homectl_domain::error::HomectlError;
use homectl_domain::group::{DevicePattern, GroupConfig};
use homectl_domain::path::DevicePath;

use crate::bus::{Bus, encode_reply};
use crate::ports::Plugin;

struct Group {
    patterns: Vec<DevicePattern>,
}

impl Group {
    fn matches(&self, path: &DevicePath) -> bool {
        self.patterns.iter().any(|p| p.matches(path.as_str()))
    }
}

/// Named device sets defined by glob patterns.
pub struct Groups {
    groups: BTreeMap<String, Group>,
}

impl Groups {
    /// Compile every group's patterns.
    ///
    /// # Errors
    ///
    /// Returns [`HomectlError::InvalidConfig`] for the first group holding
    /// an invalid pattern.
    pub fn new(config: &BTreeMap<String, GroupConfig>) -> Result<Self, HomectlError> {
        let groups = config
            .iter()
            .map(|(name, group)| {
                let patterns = group
                    .devices
                    .iter()
                    .map(|pattern| DevicePattern::new(pattern))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|err| HomectlError::invalid_config(format!("groups/{name}"), err))?;
                Ok((name.clone(), Group { patterns }))
            })
            .collect::<Result<BTreeMap<_, _>, HomectlError>>()?;

        Ok(Self { groups })
    }

    /// Members of group `name`, or `None` when no such group is configured.
    ///
    /// # Errors
    ///
    /// Propagates a failing `devices/getDevices` call.
    #[tracing::instrument(skip(self, bus))]
    pub async fn members(
        &self,
        name: &str,
        bus: &Bus,
    ) -> Result<Option<BTreeMap<DevicePath, DeviceState>>, HomectlError> {
        let Some(group) = self.groups.get(name) else {
            tracing::warn!(group = name, "unknown group");
            return Ok(None);
        };

        let devices: BTreeMap<DevicePath, DeviceState> =
            bus.send("devices/getDevices", &()).await?;

        Ok(Some(
            devices
                .into_iter()
                .filter(|(path, _)| group.matches(path))
                .collect(),
        ))
    }
}

#[async_trait]
impl Plugin for Groups {
    async fn register(&self, _bus: &Bus) -> Result<(), HomectlError> {
        tracing::debug!(count = self.groups.len(), "groups registered");
        Ok(())
    }

    async fn handle_msg(
        &self,
        path: &str,
        _payload: serde_json::Value,
        bus: &Bus,
    ) -> Result<serde_json::Value, HomectlError> {
        let members = self.members(path, bus).await?;
        encode_reply(path, &members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::testing::{Recorder, bus};
    use serde_json::json;
    use std::sync::Arc;

    fn groups(entries: &[(&str, &[&str])]) -> Groups {
        let config = entries
            .iter()
            .map(|(name, patterns)| {
                let group = GroupConfig {
                    name: None,
                    devices: patterns.iter().map(ToString::to_string).collect(),
                };
                (name.to_string(), group)
            })
            .collect();
        Groups::new(&config).unwrap()
    }

    fn devices_replying(paths: &[&str]) -> Arc<Recorder> {
        let map: serde_json::Map<String, serde_json::Value> = paths
            .iter()
            .map(|p| (p.to_string(), json!({ "power": true, "brightness": 1.0 })))
            .collect();
        Arc::new(Recorder::replying(serde_json::Value::Object(map)))
    }

    #[tokio::test]
    async fn should_return_matching_devices_with_state() {
        let groups = Arc::new(groups(&[("living", &["devices/hue/*"])]));
        let devices = devices_replying(&["devices/hue/a", "devices/hue/b", "devices/lifx/c"]);
        let bus = bus(vec![
            ("groups", groups as Arc<dyn Plugin>),
            ("devices", Arc::clone(&devices) as Arc<dyn Plugin>),
        ]);

        let members: Option<BTreeMap<DevicePath, DeviceState>> =
            bus.send("groups/living", &()).await.unwrap();

        let paths: Vec<String> = members.unwrap().keys().map(ToString::to_string).collect();
        assert_eq!(paths, vec!["devices/hue/a", "devices/hue/b"]);
        assert_eq!(devices.messages()[0].0, "getDevices");
    }

    #[tokio::test]
    async fn should_match_any_of_several_patterns() {
        let groups = Arc::new(groups(&[(
            "all",
            &["devices/hue/a", "integrations/lifx/*"],
        )]));
        let devices = devices_replying(&["devices/hue/a", "devices/hue/b", "devices/lifx/c"]);
        let bus = bus(vec![
            ("groups", groups as Arc<dyn Plugin>),
            ("devices", devices as Arc<dyn Plugin>),
        ]);

        let members: Option<BTreeMap<DevicePath, DeviceState>> =
            bus.send("groups/all", &()).await.unwrap();

        assert_eq!(members.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_reply_null_when_group_unknown() {
        let groups = Arc::new(groups(&[]));
        let devices = devices_replying(&[]);
        let bus = bus(vec![
            ("groups", groups as Arc<dyn Plugin>),
            ("devices", Arc::clone(&devices) as Arc<dyn Plugin>),
        ]);

        let reply = bus.send_value("groups/nope", json!(null)).await.unwrap();

        assert_eq!(reply, json!(null));
        assert!(devices.messages().is_empty());
        assert!(bus.router().fatal_error().is_none());
    }

    #[test]
    fn should_reject_invalid_pattern_at_construction() {
        let config = BTreeMap::from([(
            "broken".to_string(),
            GroupConfig {
                name: None,
                devices: vec!["devices/[hue".to_string()],
            },
        )]);
        let err = Groups::new(&config).err().unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("groups/broken"));
    }
}
