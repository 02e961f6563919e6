// HostSync - Device Data Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Network devices discovered through NetworkManager.
//!
//! Devices are never created by an administrator; they only appear and
//! disappear through discovery.

use serde::{Deserialize, Serialize};

use super::connection::ConnectionId;

/// A device as reported by `nmcli device show`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveDevice {
    /// ethernet, team, bridge, loopback...
    pub dtype: Option<String>,
    pub mac: Option<String>,
    pub mtu: Option<String>,
    /// e.g. `100 (connected)`.
    pub state: Option<String>,
    /// Name of the connection bound to the device.
    pub connection: Option<String>,
}

/// Administrative record of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDevice {
    /// Interface name (e.g., "enp0s3", "lo").
    pub name: String,
    pub dtype: Option<String>,
    pub mac: Option<String>,
    pub mtu: Option<String>,
    pub state: Option<String>,
    /// Connection currently bound to the device. Cleared, never cascaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionId>,
}

impl NetworkDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: None,
            mac: None,
            mtu: None,
            state: None,
            connection: None,
        }
    }

    /// Whether NetworkManager manages this device.
    pub fn is_managed(&self) -> bool {
        !self
            .state
            .as_deref()
            .map(|s| s.contains("unmanaged"))
            .unwrap_or(false)
    }
}
