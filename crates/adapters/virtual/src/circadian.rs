//! Circadian — a color source following the local time of day.
//!
//! The night fade is `1` at night, `0` during the day, and ramps linearly
//! during the morning (day fade) and evening (night fade) windows. `color`
//! replies with the day color mixed towards the night color by that amount.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveTime, Timelike};
use homectl_app::bus::{Bus, encode_reply};
use homectl_app::ports::Plugin;
use homectl_domain::color::Color;
use homectl_domain::error::HomectlError;
use homectl_domain::integration::IntegrationConfig;
use serde::Deserialize;

/// Settings of a circadian integration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CircadianConfig {
    pub day_color: Color,
    /// Hour at which the morning fade starts.
    pub day_fade_start_hour: u8,
    pub day_fade_duration_hours: u8,
    pub night_color: Color,
    /// Hour at which the evening fade starts.
    pub night_fade_start_hour: u8,
    pub night_fade_duration_hours: u8,
}

/// Night fade factor in `[0, 1]` at time of day `time`.
#[must_use]
pub fn night_fade(config: &CircadianConfig, time: NaiveTime) -> f32 {
    let minutes = u16::try_from(time.hour() * 60 + time.minute()).unwrap_or(0);
    let t = f32::from(minutes);
    let at = |hour: u8| f32::from(hour) * 60.0;

    let day_start = at(config.day_fade_start_hour);
    let day_end = day_start + at(config.day_fade_duration_hours);
    let night_start = at(config.night_fade_start_hour);
    let night_end = night_start + at(config.night_fade_duration_hours);

    if t <= day_start || t >= night_end {
        return 1.0;
    }
    if t >= day_end && t <= night_start {
        return 0.0;
    }
    if t < day_end {
        1.0 - (t - day_start) / (day_end - day_start)
    } else {
        (t - night_start) / (night_end - night_start)
    }
}

/// Circadian color source.
pub struct Circadian {
    id: String,
    config: CircadianConfig,
}

impl Circadian {
    /// Factory for the integration registry.
    ///
    /// # Errors
    ///
    /// Returns [`HomectlError::InvalidConfig`] for missing settings or
    /// unparsable colors.
    pub fn create(id: &str, config: &IntegrationConfig) -> Result<Arc<dyn Plugin>, HomectlError> {
        Ok(Arc::new(Self {
            id: id.to_string(),
            config: config.decode(id)?,
        }))
    }

    /// Blended color at time of day `time`.
    #[must_use]
    pub fn color_at(&self, time: NaiveTime) -> Color {
        let fade = night_fade(&self.config, time);
        self.config.day_color.mix(self.config.night_color, fade)
    }
}

#[async_trait]
impl Plugin for Circadian {
    async fn register(&self, _bus: &Bus) -> Result<(), HomectlError> {
        tracing::debug!(integration = %self.id, "registered circadian plugin");
        Ok(())
    }

    async fn handle_msg(
        &self,
        path: &str,
        _payload: serde_json::Value,
        _bus: &Bus,
    ) -> Result<serde_json::Value, HomectlError> {
        match path {
            "color" => encode_reply(path, &self.color_at(Local::now().time())),
            _ => {
                tracing::warn!(integration = %self.id, path, "unknown circadian command");
                Ok(serde_json::Value::Null)
            }
        }
    }
}
