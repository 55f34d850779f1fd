//! Device hot-plug notifications.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a hot-plugged device (its sysfs path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceAction {
    Add,
    Remove,
    Change,
    Move,
    Other(String),
}

impl DeviceAction {
    /// Parse an action name as reported by udev.
    pub fn parse(action: &str) -> Self {
        match action {
            "add" => Self::Add,
            "remove" => Self::Remove,
            "change" => Self::Change,
            "move" => Self::Move,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A single hot-plug notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub action: DeviceAction,
    pub id: DeviceId,
}

impl DeviceEvent {
    pub fn added(id: impl Into<String>) -> Self {
        Self {
            action: DeviceAction::Add,
            id: DeviceId::new(id),
        }
    }

    pub fn removed(id: impl Into<String>) -> Self {
        Self {
            action: DeviceAction::Remove,
            id: DeviceId::new(id),
        }
    }

    /// Parse an `<action> <id>` line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let action = DeviceAction::parse(parts.next()?);
        let id = parts.next()?;
        Some(Self {
            action,
            id: DeviceId::new(id),
        })
    }
}
