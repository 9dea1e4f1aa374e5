//! Routine — edge-triggered rules over sensor values.
//!
//! A routine fires its actions once when its conditions go from "not all
//! satisfied" to "all satisfied". It does not fire again while the
//! conditions simply remain satisfied.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Static routine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineConfig {
    pub when: Vec<Condition>,
    #[serde(rename = "do")]
    pub actions: Vec<RoutineAction>,
}

impl RoutineConfig {
    /// Whether any condition watches `path`.
    #[must_use]
    pub fn references(&self, path: &str) -> bool {
        self.when.iter().any(|c| c.path == path)
    }
}

/// Requires the sensor at `path` to hold exactly `is`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub path: String,
    pub is: serde_json::Value,
}

/// Outcome of evaluating a routine's conditions against a sensor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Satisfied,
    Unsatisfied,
    /// A referenced sensor has never reported a value.
    UnknownSensor(String),
}

impl Evaluation {
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

/// Evaluate the conjunction of `conditions` against `sensors`.
///
/// An unknown sensor short-circuits the evaluation.
#[must_use]
pub fn evaluate(
    conditions: &[Condition],
    sensors: &HashMap<String, serde_json::Value>,
) -> Evaluation {
    for condition in conditions {
        match sensors.get(&condition.path) {
            None => return Evaluation::UnknownSensor(condition.path.clone()),
            Some(value) if *value != condition.is => return Evaluation::Unsatisfied,
            Some(_) => {}
        }
    }
    Evaluation::Satisfied
}

/// A new value reported for a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorUpdate {
    pub path: String,
    pub value: serde_json::Value,
}

/// A bus message sent when a routine fires, written as
/// `"<path> [args...]"` in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutineAction {
    pub path: String,
    pub args: Vec<String>,
}

impl RoutineAction {
    /// Parse an action string, splitting on whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyAction`] for a blank string.
    pub fn parse(action: &str) -> Result<Self, ValidationError> {
        let mut words = action.split_whitespace();
        let path = words.next().ok_or(ValidationError::EmptyAction)?;
        Ok(Self {
            path: path.to_string(),
            args: words.map(str::to_string).collect(),
        })
    }

    /// The message payload: a lone argument unwrapped, otherwise the list.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self.args.as_slice() {
            [single] => serde_json::Value::String(single.clone()),
            args => serde_json::Value::from(args.to_vec()),
        }
    }
}

impl fmt::Display for RoutineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for RoutineAction {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoutineAction> for String {
    fn from(value: RoutineAction) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(path: &str, is: serde_json::Value) -> Condition {
        Condition {
            path: path.to_string(),
            is,
        }
    }

    #[test]
    fn should_unwrap_single_argument() {
        let action = RoutineAction::parse("devices/activateScene evening").unwrap();
        assert_eq!(action.path, "devices/activateScene");
        assert_eq!(action.payload(), json!("evening"));
    }

    #[test]
    fn should_pass_multiple_arguments_as_list() {
        let action = RoutineAction::parse("devices/adjustBrightness  groups/living -0.2").unwrap();
        assert_eq!(action.payload(), json!(["groups/living", "-0.2"]));
        assert_eq!(action.to_string(), "devices/adjustBrightness groups/living -0.2");
    }

    #[test]
    fn should_pass_empty_list_without_arguments() {
        let action = RoutineAction::parse("integrations/dummy/ping").unwrap();
        assert_eq!(action.payload(), json!([]));
    }

    #[test]
    fn should_reject_blank_action() {
        assert_eq!(RoutineAction::parse("   "), Err(ValidationError::EmptyAction));
    }

    #[test]
    fn should_be_satisfied_when_all_conditions_hold() {
        let conditions = vec![condition("a", json!(true)), condition("b", json!("ARMED"))];
        let sensors = HashMap::from([
            ("a".to_string(), json!(true)),
            ("b".to_string(), json!("ARMED")),
        ]);
        assert!(evaluate(&conditions, &sensors).is_satisfied());
    }

    #[test]
    fn should_be_unsatisfied_when_any_value_differs() {
        let conditions = vec![condition("a", json!(true)), condition("b", json!("ARMED"))];
        let sensors = HashMap::from([
            ("a".to_string(), json!(true)),
            ("b".to_string(), json!("DISARMED")),
        ]);
        assert_eq!(evaluate(&conditions, &sensors), Evaluation::Unsatisfied);
    }

    #[test]
    fn should_report_unknown_sensor() {
        let conditions = vec![condition("a", json!(true)), condition("b", json!(true))];
        let sensors = HashMap::from([("a".to_string(), json!(true))]);
        assert_eq!(
            evaluate(&conditions, &sensors),
            Evaluation::UnknownSensor("b".to_string())
        );
    }

    #[test]
    fn should_detect_referenced_paths() {
        let routine: RoutineConfig = serde_json::from_value(json!({
            "when": [{ "path": "integrations/dummy/motion", "is": true }],
            "do": ["devices/activateScene evening"]
        }))
        .unwrap();
        assert!(routine.references("integrations/dummy/motion"));
        assert!(!routine.references("integrations/dummy/door"));
        assert_eq!(routine.actions[0].path, "devices/activateScene");
    }
}
