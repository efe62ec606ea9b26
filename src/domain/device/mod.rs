//! Device domain — actuator commands and the operator-facing catalog.

pub mod dispatcher;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::shared::DeviceId;

pub use dispatcher::CommandDispatcher;

/// Switch an actuator on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    On,
    Off,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::On => "ON",
            Action::Off => "OFF",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ON" => Ok(Action::On),
            "OFF" => Ok(Action::Off),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

/// A transient operator command. Not retained after dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub device_id: DeviceId,
    pub action: Action,
}

impl DeviceCommand {
    pub fn new(device_id: impl Into<DeviceId>, action: Action) -> Self {
        Self {
            device_id: device_id.into(),
            action,
        }
    }

    /// Wire token: `{DEVICE}_{ON|OFF}`, e.g. `FAN_ON`.
    pub fn token(&self) -> String {
        format!("{}_{}", self.device_id, self.action)
    }
}

/// A controllable actuator as listed on the device-control panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub id: DeviceId,
}

impl Device {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            id: DeviceId::new(id),
        }
    }
}

/// The rearing house's standard actuators.
pub fn default_devices() -> Vec<Device> {
    vec![
        Device::new("Exhaust Fan", "FAN"),
        Device::new("Heater", "HEATER"),
        Device::new("Humidifier", "HUMIDIFIER"),
        Device::new("Air Cooler", "COOLER"),
    ]
}
