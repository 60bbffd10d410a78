//! Device identity sent to the remote notification registry

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mobile operating system the client runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Ios,
    Android,
}

impl OsType {
    /// Human-readable platform name used in device names
    pub fn display_name(&self) -> &'static str {
        match self {
            OsType::Ios => "iOS",
            OsType::Android => "Android",
        }
    }

    /// Placeholder id when the platform cannot provide one
    pub fn unknown_device_id(&self) -> &'static str {
        match self {
            OsType::Ios => "unknown-ios",
            OsType::Android => "unknown-android",
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsType::Ios => write!(f, "ios"),
            OsType::Android => write!(f, "android"),
        }
    }
}

/// Stable identity of this device as known to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub device_id: String,
    pub device_name: String,
    pub os_type: OsType,
}

impl DeviceIdentity {
    /// Build an identity from raw platform values.
    ///
    /// Missing ids fall back to a per-platform placeholder and the name is
    /// formatted as `"<model> (<os> <version>)"`.
    pub fn describe(
        os_type: OsType,
        device_id: Option<&str>,
        model_name: Option<&str>,
        os_version: Option<&str>,
    ) -> Self {
        let device_id = device_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(os_type.unknown_device_id())
            .to_string();

        let model = model_name
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Unknown Device");
        let version = os_version.unwrap_or("");
        let device_name = format!("{} ({} {})", model, os_type.display_name(), version)
            .replace(" )", ")");

        Self {
            device_id,
            device_name,
            os_type,
        }
    }
}
