//! Scene — a named, templated set of per-device commands.
//!
//! Each entry targets either a single device or a whole group, and each of
//! its fields is either a literal or a reference to a bus path whose reply
//! supplies the value at activation time (e.g. a circadian color source).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::device::Brightness;
use crate::error::ValidationError;
use crate::path::{DevicePath, group_name};

/// Static scene configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Display name, defaults to the configuration key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub devices: Vec<SceneDeviceTemplate>,
}

/// One templated entry of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDeviceTemplate {
    pub path: SceneTarget,
    pub power: Dynamic<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Dynamic<Color>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<Dynamic<Brightness>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Dynamic<u64>>,
}

/// What a scene entry addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SceneTarget {
    /// A group name, expanded to its members at activation time.
    Group(String),
    Device(DevicePath),
}

impl SceneTarget {
    /// Parse `groups/<name>` or a device path.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDevicePath`] when the path is
    /// neither.
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        match group_name(path) {
            Some(name) => Ok(Self::Group(name.to_string())),
            None => DevicePath::parse(path).map(Self::Device),
        }
    }
}

impl fmt::Display for SceneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(name) => write!(f, "groups/{name}"),
            Self::Device(path) => path.fmt(f),
        }
    }
}

impl TryFrom<String> for SceneTarget {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SceneTarget> for String {
    fn from(value: SceneTarget) -> Self {
        value.to_string()
    }
}

/// A field value that is either given literally or fetched from the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dynamic<T> {
    Reference(BusReference),
    Literal(T),
}

/// A bus path used as a value source, e.g. `integrations/circadian/color`.
///
/// Any string containing a `/` is treated as a reference; no color literal
/// contains one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BusReference(String);

impl BusReference {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BusReference {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = value
            .split_once('/')
            .is_some_and(|(head, tail)| !head.is_empty() && !tail.is_empty());
        if valid {
            Ok(Self(value))
        } else {
            Err("not a bus path")
        }
    }
}

impl From<BusReference> for String {
    fn from(value: BusReference) -> Self {
        value.0
    }
}

impl fmt::Display for BusReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
