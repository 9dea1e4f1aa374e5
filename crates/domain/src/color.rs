//! Color — canonical HSV representation of a light color.
//!
//! Colors are stored as whole-degree hue and whole-percent saturation/value,
//! which makes equality exact and gives every color a single canonical
//! string form, `hsv(H, S%, V%)`. Hex codes (`#ff8800`, `#f80`) and CSS
//! color names are accepted on input and normalized through sRGB.
//!
//! A device's stored color never includes its brightness; use
//! [`Color::with_brightness`] to composite brightness into the value channel
//! right before the color leaves the hub.

use std::fmt;
use std::str::FromStr;

use palette::{FromColor, Hsv, Srgb};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A color in canonical HSV form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    hue: u16,
    saturation: u8,
    value: u8,
}

impl Color {
    /// Build a color from whole-degree hue and whole-percent saturation/value.
    ///
    /// Hue wraps around 360; saturation and value are capped at 100.
    #[must_use]
    pub fn new(hue: u16, saturation: u8, value: u8) -> Self {
        Self {
            hue: hue % 360,
            saturation: saturation.min(100),
            value: value.min(100),
        }
    }

    /// Hue in degrees, `0..360`.
    #[must_use]
    pub fn hue(self) -> u16 {
        self.hue
    }

    /// Saturation in percent, `0..=100`.
    #[must_use]
    pub fn saturation(self) -> u8 {
        self.saturation
    }

    /// Value (lightness of the HSV cone) in percent, `0..=100`.
    #[must_use]
    pub fn value(self) -> u8 {
        self.value
    }

    /// Parse any supported color literal.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidColor`] for anything that is not a
    /// canonical `hsv(...)` string, a `#`-prefixed hex code or a CSS color
    /// name.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidColor(input.to_string());
        let trimmed = input.trim();

        if let Some(args) = trimmed
            .strip_prefix("hsv(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_hsv_args(args).ok_or_else(invalid);
        }

        if trimmed.starts_with('#') {
            let rgb: Srgb<u8> = trimmed.parse().map_err(|_| invalid())?;
            return Ok(Self::from_srgb(rgb.into_format()));
        }

        palette::named::from_str(&trimmed.to_ascii_lowercase())
            .map(|rgb| Self::from_srgb(rgb.into_format()))
            .ok_or_else(invalid)
    }

    /// Convert an sRGB color, rounding to the canonical resolution.
    #[must_use]
    pub fn from_srgb(rgb: Srgb) -> Self {
        let hsv: Hsv = Hsv::from_color(rgb);
        Self::new(
            round_to_u16(f64::from(hsv.hue.into_positive_degrees())),
            round_percent(f64::from(hsv.saturation)),
            round_percent(f64::from(hsv.value)),
        )
    }

    /// Convert to sRGB.
    #[must_use]
    pub fn to_srgb(self) -> Srgb {
        let hsv: Hsv = Hsv::new(
            f32::from(self.hue),
            f32::from(self.saturation) / 100.0,
            f32::from(self.value) / 100.0,
        );
        Srgb::<f32>::from_color(hsv)
    }

    /// Composite `brightness` (clamped to `[0, 1]`) into the value channel.
    #[must_use]
    pub fn with_brightness(self, brightness: f64) -> Self {
        let scaled = f64::from(self.value) * brightness.clamp(0.0, 1.0);
        Self {
            value: round_to_u8(scaled),
            ..self
        }
    }

    /// Interpolate towards `other` in sRGB space.
    ///
    /// `amount` is clamped to `[0, 1]`: `0` returns `self`, `1` returns `other`.
    #[must_use]
    pub fn mix(self, other: Self, amount: f32) -> Self {
        let p = amount.clamp(0.0, 1.0);
        let from = self.to_srgb();
        let to = other.to_srgb();
        let lerp = |a: f32, b: f32| a + (b - a) * p;
        Self::from_srgb(Srgb::new(
            lerp(from.red, to.red),
            lerp(from.green, to.green),
            lerp(from.blue, to.blue),
        ))
    }
}

fn parse_hsv_args(args: &str) -> Option<Color> {
    let mut parts = args.split(',').map(|part| part.trim().trim_end_matches('%').trim());
    let hue: f64 = parts.next()?.parse().ok()?;
    let saturation: f64 = parts.next()?.parse().ok()?;
    let value: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let in_range = |v: f64| (0.0..=100.0).contains(&v);
    if !(0.0..=360.0).contains(&hue) || !in_range(saturation) || !in_range(value) {
        return None;
    }

    Some(Color::new(
        round_to_u16(hue),
        round_to_u8(saturation),
        round_to_u8(value),
    ))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_to_u16(v: f64) -> u16 {
    v.round().clamp(0.0, f64::from(u16::MAX)) as u16
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 100.0) as u8
}

fn round_percent(fraction: f64) -> u8 {
    round_to_u8(fraction * 100.0)
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hsv({}, {}%, {}%)", self.hue, self.saturation, self.value)
    }
}

impl FromStr for Color {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_hex_into_canonical_hsv() {
        let color = Color::parse("#ff8800").unwrap();
        assert_eq!(color.to_string(), "hsv(32, 100%, 100%)");
    }

    #[test]
    fn should_parse_short_hex() {
        assert_eq!(Color::parse("#f80").unwrap(), Color::parse("#ff8800").unwrap());
    }

    #[test]
    fn should_parse_named_colors_case_insensitively() {
        assert_eq!(Color::parse("Red").unwrap(), Color::new(0, 100, 100));
        assert_eq!(Color::parse("white").unwrap(), Color::new(0, 0, 100));
    }

    #[test]
    fn should_parse_canonical_form() {
        let color = Color::parse("hsv(240, 50%, 75%)").unwrap();
        assert_eq!(color, Color::new(240, 50, 75));
        assert_eq!(Color::parse(&color.to_string()).unwrap(), color);
    }

    #[test]
    fn should_wrap_full_circle_hue() {
        assert_eq!(Color::parse("hsv(360, 100%, 100%)").unwrap().hue(), 0);
    }

    #[test]
    fn should_reject_unknown_literals() {
        for bad in ["", "integrations/circadian/color", "#xyz", "hsv(10, 200%, 5%)", "nocolor"] {
            assert!(Color::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn should_composite_brightness_into_value_channel() {
        let color = Color::new(30, 100, 80);
        assert_eq!(color.with_brightness(0.5), Color::new(30, 100, 40));
        assert_eq!(color.with_brightness(1.0), color);
        assert_eq!(color.with_brightness(0.0).value(), 0);
    }

    #[test]
    fn should_clamp_brightness_when_compositing() {
        let color = Color::new(30, 100, 80);
        assert_eq!(color.with_brightness(3.0), color);
        assert_eq!(color.with_brightness(-1.0).value(), 0);
    }

    #[test]
    fn should_mix_endpoints_exactly() {
        let day = Color::new(0, 0, 100);
        let night = Color::new(30, 100, 100);
        assert_eq!(day.mix(night, 0.0), day);
        assert_eq!(day.mix(night, 1.0), night);
    }

    #[test]
    fn should_serialize_as_canonical_string() {
        let json = serde_json::to_value(Color::new(120, 100, 50)).unwrap();
        assert_eq!(json, serde_json::json!("hsv(120, 100%, 50%)"));

        let parsed: Color = serde_json::from_value(serde_json::json!("#00ff00")).unwrap();
        assert_eq!(parsed, Color::new(120, 100, 100));
    }
}
