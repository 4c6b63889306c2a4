use crate::domain::PeerId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a device in the star topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    /// Owns the rendezvous identifier and accepts inbound connections
    Host,
    /// Connected outward to the host
    Client,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Host => f.write_str("host"),
            DeviceRole::Client => f.write_str("client"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Desktop,
    Mobile,
    Tablet,
    #[default]
    Unknown,
}

impl std::str::FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(DeviceKind::Desktop),
            "mobile" | "phone" => Ok(DeviceKind::Mobile),
            "tablet" => Ok(DeviceKind::Tablet),
            "unknown" => Ok(DeviceKind::Unknown),
            other => Err(format!("unknown device kind: {}", other)),
        }
    }
}

/// Connection metadata a device announces about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self::new("unnamed device", DeviceKind::Unknown)
    }
}

/// A connected device as presented to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerDescriptor {
    pub remote: PeerId,
    pub name: String,
    pub kind: DeviceKind,
    pub role: DeviceRole,
}
