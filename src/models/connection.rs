// HostSync - Connection Data Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Network connection profiles.
//!
//! A [`NetworkConnection`] is the administrative mirror of one NetworkManager
//! connection. Its type-specific configuration is carried inline as a
//! [`ConnectionKind`] variant, so the connection type is always read from
//! the record itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Store-assigned connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IPv4 configuration method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Ipv4Method {
    /// Obtain address via DHCP.
    #[default]
    Auto,
    /// Manual/static configuration.
    Manual,
}

impl Ipv4Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for Ipv4Method {
    type Err = super::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            other => Err(super::Error::ValidationFailed(format!(
                "Unsupported config method ({}). Supported ones include: (auto, manual).",
                other
            ))),
        }
    }
}

/// Scalar settings shared by live and administrative connections.
///
/// Multi-valued fields are comma-joined; an empty list is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Display name (`connection.id`).
    pub name: Option<String>,
    /// `activated`, `activating`, or `None` when inactive.
    pub state: Option<String>,
    #[serde(default = "default_true")]
    pub autoconnect: bool,
    pub ipv4_method: Option<String>,
    /// Ordered, e.g. `192.168.1.5/24,10.0.0.2/8`.
    pub ipv4_addresses: Option<String>,
    pub ipv4_gw: Option<String>,
    /// De-duplicated, order of first appearance.
    pub ipv4_dns: Option<String>,
    pub ipv4_dns_search: Option<String>,
    pub ipv6_method: Option<String>,
    pub ipv6_addresses: Option<String>,
    pub ipv6_gw: Option<String>,
    pub ipv6_dns: Option<String>,
    pub ipv6_dns_search: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Ethernet-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetConfig {
    pub mac: Option<String>,
    pub cloned_mac: Option<String>,
    /// Raw nmcli value; may be `auto`.
    pub mtu: Option<String>,
}

/// Team (teamd) settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamConfig {
    pub name: Option<String>,
    /// Runner configuration as JSON.
    pub config: Option<String>,
}

/// Bond settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondConfig {
    pub name: Option<String>,
    /// Bond options as a JSON object, e.g. `{"mode":"active-backup"}`.
    pub config: Option<String>,
}

/// Bridge settings, mirrored from the container engine network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub docker_name: Option<String>,
    /// `host=ip` pairs, comma-joined.
    pub aux_address: Option<String>,
    pub dgateway: Option<String>,
    pub host_binding: Option<String>,
    pub icc: bool,
    pub internal: bool,
    pub ip_masquerade: bool,
    pub ip_range: Option<String>,
    pub subnet: Option<String>,
    /// Created by an administrator rather than by the engine or an app.
    #[serde(default)]
    pub usercon: bool,
}

/// Type-specific configuration of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ctype", content = "config", rename_all = "lowercase")]
pub enum ConnectionKind {
    Ethernet(EthernetConfig),
    Team(TeamConfig),
    Bond(BondConfig),
    Bridge(BridgeConfig),
}

impl ConnectionKind {
    /// Short administrative type name.
    pub fn ctype(&self) -> &'static str {
        match self {
            Self::Ethernet(_) => "ethernet",
            Self::Team(_) => "team",
            Self::Bond(_) => "bond",
            Self::Bridge(_) => "bridge",
        }
    }

    /// Whether this kind aggregates member connections.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Team(_) | Self::Bond(_))
    }
}

/// Connection type as observed on the live system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveKind {
    Known(ConnectionKind),
    /// A type HostSync does not model, e.g. `vlan` or `loopback`.
    Unsupported(String),
}

/// A connection as reported by NetworkManager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveConnection {
    pub settings: ConnectionSettings,
    /// Name of the master connection, for team/bond/bridge members.
    pub master: Option<String>,
    pub kind: Option<LiveKind>,
}

/// Administrative record of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConnection {
    pub id: ConnectionId,
    /// NetworkManager-assigned UUID; the join key with the live system.
    pub uuid: String,
    #[serde(flatten)]
    pub settings: ConnectionSettings,
    /// Master connection when this is a team/bond member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConnectionKind>,
}

impl NetworkConnection {
    /// Create a record with default settings.
    pub fn new(id: ConnectionId, uuid: impl Into<String>) -> Self {
        Self {
            id,
            uuid: uuid.into(),
            settings: ConnectionSettings {
                autoconnect: true,
                ..ConnectionSettings::default()
            },
            master: None,
            kind: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.settings.name.as_deref()
    }

    /// Administrative type name, if the type is known.
    pub fn ctype(&self) -> Option<&'static str> {
        self.kind.as_ref().map(ConnectionKind::ctype)
    }

    /// First IPv4 address without its prefix length.
    pub fn ipaddr(&self) -> Option<&str> {
        let addresses = self.settings.ipv4_addresses.as_deref()?;
        addresses.split(',').next()?.split('/').next()
    }

    /// Ethernet MTU, or `default` when unset or not numeric.
    pub fn mtu(&self, default: u32) -> u32 {
        match &self.kind {
            Some(ConnectionKind::Ethernet(eth)) => eth
                .mtu
                .as_deref()
                .and_then(|m| m.parse().ok())
                .unwrap_or(default),
            _ => default,
        }
    }

    /// Team runner name, e.g. `activebackup`.
    pub fn team_profile(&self) -> Option<String> {
        let Some(ConnectionKind::Team(team)) = &self.kind else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(team.config.as_deref()?).ok()?;
        value["runner"]["name"].as_str().map(String::from)
    }

    /// Bonding mode, e.g. `802.3ad`.
    pub fn bond_profile(&self) -> Option<String> {
        let Some(ConnectionKind::Bond(bond)) = &self.kind else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(bond.config.as_deref()?).ok()?;
        value["mode"].as_str().map(String::from)
    }

    /// Container engine network backing this bridge.
    pub fn docker_name(&self) -> Option<&str> {
        match &self.kind {
            Some(ConnectionKind::Bridge(bridge)) => bridge.docker_name.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(kind: ConnectionKind) -> NetworkConnection {
        let mut conn = NetworkConnection::new(ConnectionId(1), "u-1");
        conn.kind = Some(kind);
        conn
    }

    #[test]
    fn test_ipaddr_strips_prefix() {
        let mut conn = NetworkConnection::new(ConnectionId(1), "u-1");
        assert_eq!(conn.ipaddr(), None);
        conn.settings.ipv4_addresses = Some("192.168.1.5/24,10.0.0.1/8".into());
        assert_eq!(conn.ipaddr(), Some("192.168.1.5"));
    }

    #[test]
    fn test_mtu_falls_back() {
        let conn = connection(ConnectionKind::Ethernet(EthernetConfig {
            mtu: Some("auto".into()),
            ..Default::default()
        }));
        assert_eq!(conn.mtu(1500), 1500);

        let conn = connection(ConnectionKind::Ethernet(EthernetConfig {
            mtu: Some("9000".into()),
            ..Default::default()
        }));
        assert_eq!(conn.mtu(1500), 9000);
    }

    #[test]
    fn test_profiles() {
        let team = connection(ConnectionKind::Team(TeamConfig {
            name: Some("team0".into()),
            config: Some(r#"{ "runner": {"name": "activebackup"}}"#.into()),
        }));
        assert_eq!(team.team_profile().as_deref(), Some("activebackup"));
        assert_eq!(team.bond_profile(), None);
        assert_eq!(team.ctype(), Some("team"));

        let bond = connection(ConnectionKind::Bond(BondConfig {
            name: Some("bond0".into()),
            config: Some(r#"{"mode":"802.3ad","miimon":"100"}"#.into()),
        }));
        assert_eq!(bond.bond_profile().as_deref(), Some("802.3ad"));
    }

    #[test]
    fn test_kind_serialization_is_tagged() {
        let conn = connection(ConnectionKind::Bridge(BridgeConfig {
            docker_name: Some("rocknet".into()),
            ..Default::default()
        }));
        let json = serde_json::to_value(&conn).expect("serialize");
        assert_eq!(json["kind"]["ctype"], "bridge");
        assert_eq!(json["kind"]["config"]["docker_name"], "rocknet");
        let back: NetworkConnection = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.docker_name(), Some("rocknet"));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("manual".parse::<Ipv4Method>().ok(), Some(Ipv4Method::Manual));
        assert!("dhcp".parse::<Ipv4Method>().is_err());
    }
}
