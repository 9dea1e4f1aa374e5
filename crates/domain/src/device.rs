//! Device state — the "wished" record, outbound commands and observed facts.
//!
//! The devices subsystem owns one [`DeviceState`] per [`DevicePath`]. It is
//! only ever changed through [`DeviceState::compose`], which merges the
//! layers in a fixed order of increasing precedence:
//!
//! 1. static defaults (`power: true`, `brightness: 1`, no transition, no scene)
//! 2. the device's currently stored record
//! 3. the default transition (500 ms), replacing any stored transition
//! 4. scene activation (`scene`, `scene_activation_time`, and `brightness: 1`
//!    unless the activation is a replay)
//! 5. the explicit fields of the command

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::path::DevicePath;
use crate::time::{DEFAULT_TRANSITION_MS, Timestamp};

/// Brightness in `[0, 1]`.
///
/// Construction clamps out-of-range values, so a stored brightness can never
/// leave the unit interval. `NaN` collapses to `0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Brightness(f64);

impl Brightness {
    /// Full brightness.
    pub const MAX: Self = Self(1.0);
    /// Zero brightness.
    pub const MIN: Self = Self(0.0);

    /// Clamp `value` into `[0, 1]`.
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::MIN;
        }
        Self(value.clamp(0.0, 1.0))
    }

    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Add a relative `rate`, clamping the result.
    #[must_use]
    pub fn adjust(self, rate: f64) -> Self {
        Self::new(self.0 + rate)
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Self::MAX
    }
}

impl From<f64> for Brightness {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Brightness> for f64 {
    fn from(value: Brightness) -> Self {
        value.0
    }
}

/// Canonical wished state of a single device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub power: bool,
    /// Pure color, brightness is never composited in here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default)]
    pub brightness: Brightness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_activation_time: Option<Timestamp>,
    /// Transition duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<u64>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            power: true,
            color: None,
            brightness: Brightness::MAX,
            scene: None,
            scene_activation_time: None,
            transition: None,
        }
    }
}

/// Scene context applied while composing a device record.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneActivation {
    pub name: String,
    pub activated_at: Timestamp,
    /// `false` when re-deriving a scene during reconciliation, so that
    /// user-adjusted brightness survives repeated corrections.
    pub reset_brightness: bool,
}

impl SceneActivation {
    /// A fresh activation that resets brightness to full.
    #[must_use]
    pub fn activate(name: impl Into<String>, activated_at: Timestamp) -> Self {
        Self {
            name: name.into(),
            activated_at,
            reset_brightness: true,
        }
    }

    /// A replay of an already active scene, keeping the stored brightness.
    #[must_use]
    pub fn replay(name: impl Into<String>, activated_at: Timestamp) -> Self {
        Self {
            name: name.into(),
            activated_at,
            reset_brightness: false,
        }
    }
}

impl DeviceState {
    /// Initial record for a device seen for the first time.
    #[must_use]
    pub fn discovered(observed: &DiscoveredState) -> Self {
        Self {
            power: observed.power,
            color: observed.color,
            ..Self::default()
        }
    }

    /// Compose the next record from the stored one, an optional scene
    /// activation and a command. See the module docs for the precedence.
    #[must_use]
    pub fn compose(
        stored: Option<&Self>,
        scene: Option<&SceneActivation>,
        cmd: &DeviceCommand,
    ) -> Self {
        let mut state = stored.cloned().unwrap_or_default();

        state.transition = Some(DEFAULT_TRANSITION_MS);

        if let Some(activation) = scene {
            state.scene = Some(activation.name.clone());
            state.scene_activation_time = Some(activation.activated_at);
            if activation.reset_brightness {
                state.brightness = Brightness::MAX;
            }
        }

        state.power = cmd.power;
        if let Some(color) = cmd.color {
            state.color = Some(color);
        }
        if let Some(brightness) = cmd.brightness {
            state.brightness = brightness;
        }
        if let Some(transition) = cmd.transition {
            state.transition = Some(transition);
        }

        state
    }

    /// Color as it should appear on the device, brightness composited.
    #[must_use]
    pub fn effective_color(&self) -> Option<Color> {
        self.color.map(|c| c.with_brightness(self.brightness.get()))
    }

    /// Whether the observed state satisfies this wished state.
    ///
    /// Powered-off devices match on power alone; powered-on devices must also
    /// show the brightness-composited color.
    #[must_use]
    pub fn matches(&self, observed: &DiscoveredState) -> bool {
        if self.power != observed.power {
            return false;
        }
        !self.power || self.effective_color() == observed.color
    }

    /// Outbound command reproducing this record on the device.
    #[must_use]
    pub fn to_command(&self, path: DevicePath) -> DeviceCommand {
        DeviceCommand {
            path,
            power: self.power,
            color: self.effective_color(),
            brightness: Some(self.brightness),
            transition: self.transition,
        }
    }
}

/// Instruction for a single device.
///
/// Inbound (from scenes, routines or external callers) the optional fields
/// mean "leave unchanged". Outbound (to integrations) every field is filled
/// from the stored record and `color` carries composited brightness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub path: DevicePath,
    pub power: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<Brightness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<u64>,
}

impl DeviceCommand {
    /// A bare power command with every other field left unchanged.
    #[must_use]
    pub fn power(path: DevicePath, power: bool) -> Self {
        Self {
            path,
            power,
            color: None,
            brightness: None,
            transition: None,
        }
    }
}

/// Physically observed state reported by an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredState {
    pub path: DevicePath,
    pub power: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    fn lamp() -> DevicePath {
        DevicePath::parse("devices/dummy/lamp1").unwrap()
    }

    fn stored(brightness: f64, transition: Option<u64>) -> DeviceState {
        DeviceState {
            power: true,
            color: Some(Color::new(30, 100, 100)),
            brightness: Brightness::new(brightness),
            scene: None,
            scene_activation_time: None,
            transition,
        }
    }

    #[test]
    fn should_clamp_brightness_into_unit_interval() {
        assert_eq!(Brightness::new(1.7).get(), 1.0);
        assert_eq!(Brightness::new(-0.3).get(), 0.0);
        assert_eq!(Brightness::new(f64::NAN).get(), 0.0);
        assert_eq!(Brightness::new(0.1).adjust(-1.0).get(), 0.0);
    }

    #[test]
    fn should_clamp_brightness_when_deserializing() {
        let b: Brightness = serde_json::from_value(serde_json::json!(4.2)).unwrap();
        assert_eq!(b, Brightness::MAX);
    }

    #[test]
    fn should_fill_static_defaults_for_unknown_device() {
        let state = DeviceState::compose(None, None, &DeviceCommand::power(lamp(), true));
        assert!(state.power);
        assert_eq!(state.brightness, Brightness::MAX);
        assert_eq!(state.transition, Some(DEFAULT_TRANSITION_MS));
        assert_eq!(state.scene, None);
        assert_eq!(state.color, None);
    }

    #[test]
    fn should_keep_prior_brightness_but_reset_transition_without_scene() {
        let prior = stored(0.4, Some(1000));
        let state = DeviceState::compose(Some(&prior), None, &DeviceCommand::power(lamp(), true));
        assert_eq!(state.brightness.get(), 0.4);
        assert_eq!(state.transition, Some(DEFAULT_TRANSITION_MS));
        assert_eq!(state.color, prior.color);
    }

    #[test]
    fn should_reset_brightness_when_scene_activates() {
        let prior = stored(0.4, None);
        let at = now();
        let activation = SceneActivation::activate("evening", at);
        let state = DeviceState::compose(
            Some(&prior),
            Some(&activation),
            &DeviceCommand::power(lamp(), true),
        );
        assert_eq!(state.brightness, Brightness::MAX);
        assert_eq!(state.scene.as_deref(), Some("evening"));
        assert_eq!(state.scene_activation_time, Some(at));
    }

    #[test]
    fn should_prefer_command_brightness_over_scene_reset() {
        let prior = stored(0.4, None);
        let activation = SceneActivation::activate("evening", now());
        let mut cmd = DeviceCommand::power(lamp(), true);
        cmd.brightness = Some(Brightness::new(0.2));
        let state = DeviceState::compose(Some(&prior), Some(&activation), &cmd);
        assert_eq!(state.brightness.get(), 0.2);
    }

    #[test]
    fn should_keep_brightness_when_scene_is_replayed() {
        let prior = stored(0.4, None);
        let activation = SceneActivation::replay("evening", now());
        let state = DeviceState::compose(
            Some(&prior),
            Some(&activation),
            &DeviceCommand::power(lamp(), true),
        );
        assert_eq!(state.brightness.get(), 0.4);
    }

    #[test]
    fn should_prefer_command_transition_over_default() {
        let mut cmd = DeviceCommand::power(lamp(), false);
        cmd.transition = Some(2000);
        let state = DeviceState::compose(None, None, &cmd);
        assert_eq!(state.transition, Some(2000));
        assert!(!state.power);
    }

    #[test]
    fn should_be_idempotent_when_same_command_applied_twice() {
        let mut cmd = DeviceCommand::power(lamp(), true);
        cmd.color = Some(Color::new(200, 50, 100));
        cmd.brightness = Some(Brightness::new(0.5));
        let once = DeviceState::compose(None, None, &cmd);
        let twice = DeviceState::compose(Some(&once), None, &cmd);
        assert_eq!(once, twice);
    }

    #[test]
    fn should_composite_brightness_only_in_outbound_command() {
        let state = stored(0.5, Some(500));
        let cmd = state.to_command(lamp());
        assert_eq!(state.color, Some(Color::new(30, 100, 100)));
        assert_eq!(cmd.color, Some(Color::new(30, 100, 50)));
        assert_eq!(cmd.brightness, Some(Brightness::new(0.5)));
        assert_eq!(cmd.transition, Some(500));
    }

    #[test]
    fn should_match_powered_off_device_regardless_of_color() {
        let mut state = stored(1.0, None);
        state.power = false;
        let observed = DiscoveredState {
            path: lamp(),
            power: false,
            color: Some(Color::new(200, 10, 10)),
        };
        assert!(state.matches(&observed));
    }

    #[test]
    fn should_compare_composited_color_when_powered_on() {
        let state = stored(0.5, None);
        let pure = DiscoveredState {
            path: lamp(),
            power: true,
            color: Some(Color::new(30, 100, 100)),
        };
        let composited = DiscoveredState {
            color: Some(Color::new(30, 100, 50)),
            ..pure.clone()
        };
        assert!(!state.matches(&pure));
        assert!(state.matches(&composited));
    }

    #[test]
    fn should_not_match_when_power_differs() {
        let state = stored(1.0, None);
        let observed = DiscoveredState {
            path: lamp(),
            power: false,
            color: None,
        };
        assert!(!state.matches(&observed));
    }

    #[test]
    fn should_register_discovered_fields_over_defaults() {
        let observed = DiscoveredState {
            path: lamp(),
            power: false,
            color: None,
        };
        let state = DeviceState::discovered(&observed);
        assert!(!state.power);
        assert_eq!(state.brightness, Brightness::MAX);
        assert_eq!(state.transition, None);
    }

    #[test]
    fn should_deserialize_command_with_alias_path() {
        let cmd: DeviceCommand = serde_json::from_value(serde_json::json!({
            "path": "integrations/dummy/lamp1",
            "power": true,
            "color": "#ff8800"
        }))
        .unwrap();
        assert_eq!(cmd.path, lamp());
        assert_eq!(cmd.color, Some(Color::parse("#ff8800").unwrap()));
        assert_eq!(cmd.brightness, None);
    }
}
