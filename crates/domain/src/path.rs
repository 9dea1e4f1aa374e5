//! Bus paths and canonical device paths.
//!
//! Every message on the bus is addressed by a `/`-delimited path whose first
//! segment names a subsystem. Devices may be addressed either as
//! `devices/<integration>/<id>` (canonical) or as
//! `integrations/<integration>/<id>`; both forms alias the same device.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// First path segment of the devices subsystem.
pub const DEVICES: &str = "devices";
/// First path segment of the integrations subsystem.
pub const INTEGRATIONS: &str = "integrations";
/// First path segment of the groups subsystem.
pub const GROUPS: &str = "groups";
/// First path segment of the scenes subsystem.
pub const SCENES: &str = "scenes";
/// First path segment of the routines subsystem.
pub const ROUTINES: &str = "routines";

/// Split a path into its leading segment and the remainder.
///
/// The remainder is empty when the path has a single segment.
#[must_use]
pub fn split_first(path: &str) -> (&str, &str) {
    path.split_once('/').unwrap_or((path, ""))
}

/// Return the group name if `path` addresses a group (`groups/<name>`).
#[must_use]
pub fn group_name(path: &str) -> Option<&str> {
    match split_first(path) {
        (GROUPS, name) if !name.is_empty() => Some(name),
        _ => None,
    }
}

/// Rewrite an `integrations/...` path into its `devices/...` alias.
///
/// Any other path is returned unchanged.
#[must_use]
pub fn canonicalize(path: &str) -> String {
    match split_first(path) {
        (INTEGRATIONS, rest) => format!("{DEVICES}/{rest}"),
        _ => path.to_string(),
    }
}

/// Canonical `devices/<integration>/<id>` path of a device.
///
/// Parsing accepts the `integrations/<integration>/<id>` alias and stores
/// the canonical form, so two aliases of one device compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DevicePath {
    path: String,
    integration_end: usize,
}

impl DevicePath {
    /// Parse a device path in either canonical or `integrations/` form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDevicePath`] when the path does not
    /// have the shape `<devices|integrations>/<integration>/<id>`.
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidDevicePath(path.to_string());

        let (root, rest) = split_first(path);
        if root != DEVICES && root != INTEGRATIONS {
            return Err(invalid());
        }
        let (integration, id) = rest.split_once('/').ok_or_else(invalid)?;
        if integration.is_empty() || id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            path: format!("{DEVICES}/{integration}/{id}"),
            integration_end: DEVICES.len() + 1 + integration.len(),
        })
    }

    /// Identifier of the integration owning the device.
    #[must_use]
    pub fn integration(&self) -> &str {
        &self.path[DEVICES.len() + 1..self.integration_end]
    }

    /// Integration-local device identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.path[self.integration_end + 1..]
    }

    /// Canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl TryFrom<String> for DevicePath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DevicePath> for String {
    fn from(value: DevicePath) -> Self {
        value.path
    }
}

impl std::str::FromStr for DevicePath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_split_leading_segment() {
        assert_eq!(split_first("devices/getDevices"), ("devices", "getDevices"));
        assert_eq!(
            split_first("integrations/hue/lamp/1"),
            ("integrations", "hue/lamp/1")
        );
        assert_eq!(split_first("routines"), ("routines", ""));
    }

    #[test]
    fn should_detect_group_paths() {
        assert_eq!(group_name("groups/living"), Some("living"));
        assert_eq!(group_name("groups/"), None);
        assert_eq!(group_name("devices/dummy/lamp"), None);
    }

    #[test]
    fn should_canonicalize_integration_alias() {
        assert_eq!(canonicalize("integrations/hue/lamp"), "devices/hue/lamp");
        assert_eq!(canonicalize("devices/hue/lamp"), "devices/hue/lamp");
        assert_eq!(canonicalize("groups/all"), "groups/all");
    }

    #[test]
    fn should_parse_canonical_device_path() {
        let path = DevicePath::parse("devices/hue/lamp1").unwrap();
        assert_eq!(path.integration(), "hue");
        assert_eq!(path.id(), "lamp1");
        assert_eq!(path.as_str(), "devices/hue/lamp1");
    }

    #[test]
    fn should_alias_integration_form_to_same_device() {
        let canonical = DevicePath::parse("devices/hue/lamp1").unwrap();
        let alias = DevicePath::parse("integrations/hue/lamp1").unwrap();
        assert_eq!(canonical, alias);
        assert_eq!(alias.to_string(), "devices/hue/lamp1");
    }

    #[test]
    fn should_keep_nested_segments_in_id() {
        let path = DevicePath::parse("devices/lifx/kitchen/ceiling").unwrap();
        assert_eq!(path.integration(), "lifx");
        assert_eq!(path.id(), "kitchen/ceiling");
    }

    #[test]
    fn should_reject_malformed_device_paths() {
        for bad in ["devices/hue", "devices//lamp", "groups/all/x", "lamp", "devices/hue/"] {
            assert!(DevicePath::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let path = DevicePath::parse("integrations/hue/lamp1").unwrap();
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, serde_json::json!("devices/hue/lamp1"));

        let back: DevicePath = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }
}
