// HostSync - Connection Type Resolver
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Classification of connections by type.
//!
//! [`resolve`] maps the `nmcli connection show` lines of one connection to
//! its [`LiveKind`] and type-specific settings. Bridges additionally carry
//! container engine metadata, filled in by [`bridge_config`].

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, warn};

use super::docker::{ContainerEngine, NetworkType};
use super::nmcli::{field_value, raw_value};
use crate::models::{
    BondConfig, BridgeConfig, ConnectionKind, EthernetConfig, LiveKind, Result, TeamConfig,
};

/// Value of the first line starting with `prefix`.
fn lookup(lines: &[String], prefix: &str) -> Option<String> {
    lines
        .iter()
        .find(|line| line.starts_with(prefix))
        .and_then(|line| field_value(line))
}

/// Classify one connection from its `nmcli connection show` output.
///
/// Returns `None` when no `connection.type` line is present.
pub fn resolve(lines: &[String]) -> Option<LiveKind> {
    let ctype = lookup(lines, "connection.type:")?;
    let name = lookup(lines, "connection.id:");

    let kind = match ctype.as_str() {
        "802-3-ethernet" => ConnectionKind::Ethernet(EthernetConfig {
            mac: lookup(lines, "802-3-ethernet.mac-address:"),
            cloned_mac: lookup(lines, "802-3-ethernet.cloned-mac-address:"),
            mtu: lookup(lines, "802-3-ethernet.mtu:"),
        }),
        "team" => ConnectionKind::Team(TeamConfig {
            name,
            config: lines
                .iter()
                .find(|line| line.starts_with("team.config:"))
                .and_then(|line| raw_value(line)),
        }),
        "bond" => ConnectionKind::Bond(BondConfig {
            name,
            config: lookup(lines, "bond.options:").map(|options| bond_options_json(&options)),
        }),
        "bridge" => ConnectionKind::Bridge(BridgeConfig::default()),
        other => return Some(LiveKind::Unsupported(other.to_string())),
    };

    Some(LiveKind::Known(kind))
}

/// Convert `mode=active-backup,miimon=100` to a JSON object string.
pub fn bond_options_json(options: &str) -> String {
    let map: serde_json::Map<String, serde_json::Value> = options
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| {
            (
                key.trim().to_string(),
                serde_json::Value::String(value.trim().to_string()),
            )
        })
        .collect();
    serde_json::Value::Object(map).to_string()
}

// Subset of `docker network inspect` used for bridges.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NetworkInspect {
    #[serde(rename = "IPAM")]
    ipam: Ipam,
    #[serde(rename = "Options")]
    options: Option<BTreeMap<String, String>>,
    #[serde(rename = "Internal")]
    internal: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Ipam {
    #[serde(rename = "Config")]
    config: Option<Vec<IpamConfig>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpamConfig {
    #[serde(rename = "Subnet")]
    subnet: Option<String>,
    #[serde(rename = "Gateway")]
    gateway: Option<String>,
    #[serde(rename = "IPRange")]
    ip_range: Option<String>,
    #[serde(rename = "AuxiliaryAddresses")]
    auxiliary_addresses: Option<BTreeMap<String, String>>,
}

const OPT_HOST_BINDING: &str = "com.docker.network.bridge.host_binding_ipv4";
const OPT_ICC: &str = "com.docker.network.bridge.enable_icc";
const OPT_MASQUERADE: &str = "com.docker.network.bridge.ip_masquerade";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Build bridge settings from an inspect document.
///
/// Absent keys leave the corresponding field at its default.
pub fn parse_inspect(docker_name: &str, doc: serde_json::Value) -> Result<BridgeConfig> {
    let inspect: NetworkInspect = serde_json::from_value(doc)?;
    let ipam = inspect
        .ipam
        .config
        .and_then(|configs| configs.into_iter().next())
        .unwrap_or_default();
    let options = inspect.options.unwrap_or_default();
    let flag = |key: &str| options.get(key).map(|v| v == "true").unwrap_or(false);

    let aux_address = ipam
        .auxiliary_addresses
        .filter(|aux| !aux.is_empty())
        .map(|aux| {
            aux.iter()
                .map(|(host, ip)| format!("{}={}", host, ip))
                .collect::<Vec<_>>()
                .join(",")
        });

    Ok(BridgeConfig {
        docker_name: Some(docker_name.to_string()),
        aux_address,
        dgateway: non_empty(ipam.gateway),
        host_binding: non_empty(options.get(OPT_HOST_BINDING).cloned()),
        icc: flag(OPT_ICC),
        internal: inspect.internal,
        ip_masquerade: flag(OPT_MASQUERADE),
        ip_range: non_empty(ipam.ip_range),
        subnet: non_empty(ipam.subnet),
        usercon: false,
    })
}

/// Container engine metadata for the bridge connection `name`.
///
/// `br-<id>` connections back custom networks found by id; any other bridge
/// is the engine's default `bridge` network. Defaults are returned when the
/// engine is down or the custom network is not found.
pub fn bridge_config(engine: &dyn ContainerEngine, name: &str) -> Result<BridgeConfig> {
    if !engine.service_running()? {
        debug!("Container engine not running, bridge {} left at defaults", name);
        return Ok(BridgeConfig::default());
    }

    let (docker_name, inspect_name) = match name.strip_prefix("br-") {
        Some(id) => match engine.list_networks(Some(id), Some(NetworkType::Custom))?.into_iter().next() {
            Some(network) => (network.clone(), network),
            None => {
                warn!("No container network with id {} for bridge {}", id, name);
                return Ok(BridgeConfig::default());
            }
        },
        None => (name.to_string(), "bridge".to_string()),
    };

    let doc = engine.inspect_network(&inspect_name)?;
    parse_inspect(&docker_name, doc)
}
