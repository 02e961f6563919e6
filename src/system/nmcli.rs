// HostSync - NetworkManager State Reader
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Live network state as reported by `nmcli`.
//!
//! Each device and connection is read with its own `show` call. Objects that
//! disappear between listing and reading are dropped from the result.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::command::CommandRunner;
use super::ctype;
use super::docker::ContainerEngine;
use crate::models::{
    ConnectionKind, ConnectionSettings, HostConfig, LiveConnection, LiveDevice, LiveKind, Result,
};

/// `key:   value` line of nmcli's multiline output.
static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<key>[^:]+):\s*(?P<value>.*?)\s*$").expect("valid field pattern"));

/// Raw text after the first colon, trimmed.
pub(crate) fn raw_value(line: &str) -> Option<String> {
    let caps = FIELD_RE.captures(line)?;
    let value = caps.name("value")?.as_str();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Field value, with nmcli's `--` placeholder read as absent.
pub(crate) fn field_value(line: &str) -> Option<String> {
    raw_value(line).filter(|v| v != "--")
}

/// Comma-join a list; an empty list is `None`.
pub fn flatten(items: &[String]) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(items.join(","))
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Parse `nmcli device show <dev>` output.
pub fn parse_device(lines: &[String]) -> LiveDevice {
    let mut dev = LiveDevice::default();
    for line in lines {
        if line.starts_with("GENERAL.TYPE:") {
            dev.dtype = field_value(line);
        } else if line.starts_with("GENERAL.HWADDR:") {
            dev.mac = field_value(line);
        } else if line.starts_with("GENERAL.MTU:") {
            dev.mtu = field_value(line);
        } else if line.starts_with("GENERAL.STATE:") {
            dev.state = field_value(line);
        } else if line.starts_with("GENERAL.CONNECTION:") {
            if let Some(name) = field_value(line) {
                dev.connection = Some(name);
            }
        }
    }
    dev
}

/// Parse `nmcli connection show <uuid>` output.
///
/// Prefixes are tested in a fixed order and the first match wins. Type
/// classification is delegated to [`ctype::resolve`]; bridge metadata is not
/// filled in here.
pub fn parse_connection(lines: &[String]) -> LiveConnection {
    let mut settings = ConnectionSettings {
        autoconnect: true,
        ..ConnectionSettings::default()
    };
    let mut master = None;
    let mut ipv4_addresses = Vec::new();
    let mut ipv4_dns = Vec::new();
    let mut ipv6_addresses = Vec::new();
    let mut ipv6_dns = Vec::new();

    for line in lines {
        let line = line.as_str();
        if line.starts_with("ipv4.method:") {
            settings.ipv4_method = field_value(line);
        } else if line.starts_with("connection.id:") {
            settings.name = field_value(line);
        } else if line.starts_with("GENERAL.STATE:") {
            settings.state = field_value(line);
        } else if line.starts_with("connection.autoconnect:") {
            settings.autoconnect = field_value(line).as_deref() != Some("no");
        } else if line.starts_with("IP4.ADDRESS") {
            if let Some(addr) = field_value(line) {
                ipv4_addresses.push(addr);
            }
        } else if line.starts_with("IP4.GATEWAY:") {
            settings.ipv4_gw = field_value(line);
        } else if line.starts_with("IP4.DNS") {
            if let Some(dns) = field_value(line) {
                push_unique(&mut ipv4_dns, &dns);
            }
        } else if line.starts_with("ipv4.dns:") {
            if let Some(servers) = field_value(line) {
                for dns in servers.split(',') {
                    push_unique(&mut ipv4_dns, dns);
                }
            }
        } else if line.starts_with("ipv4.dns-search:") {
            settings.ipv4_dns_search = field_value(line);
        } else if line.starts_with("ipv6.method:") {
            settings.ipv6_method = field_value(line);
        } else if line.starts_with("IP6.ADDRESS") {
            if let Some(addr) = field_value(line) {
                ipv6_addresses.push(addr);
            }
        } else if line.starts_with("IP6.GATEWAY:") {
            settings.ipv6_gw = field_value(line);
        } else if line.starts_with("IP6.DNS") {
            if let Some(dns) = field_value(line) {
                push_unique(&mut ipv6_dns, &dns);
            }
        } else if line.starts_with("ipv6.dns-search:") {
            settings.ipv6_dns_search = field_value(line);
        } else if line.starts_with("connection.master:") {
            master = field_value(line);
        }
    }

    settings.ipv4_addresses = flatten(&ipv4_addresses);
    settings.ipv4_dns = flatten(&ipv4_dns);
    settings.ipv6_addresses = flatten(&ipv6_addresses);
    settings.ipv6_dns = flatten(&ipv6_dns);

    LiveConnection {
        settings,
        master,
        kind: ctype::resolve(lines),
    }
}

/// Reads devices and connections from NetworkManager.
pub struct StateReader<'a> {
    runner: &'a dyn CommandRunner,
    engine: &'a dyn ContainerEngine,
    nmcli: String,
    vanished_code: i32,
}

impl<'a> StateReader<'a> {
    pub fn new(config: &HostConfig, runner: &'a dyn CommandRunner, engine: &'a dyn ContainerEngine) -> Self {
        Self {
            runner,
            engine,
            nmcli: config.nmcli_path.to_string_lossy().into_owned(),
            vanished_code: config.vanished_exit_code,
        }
    }

    fn list(&self, args: &[&str]) -> Result<Vec<String>> {
        let mut argv = vec![self.nmcli.as_str(), "-t", "-f"];
        argv.extend_from_slice(args);
        let out = self.runner.run(&argv, None, true)?;
        Ok(out
            .stdout
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// `show` one object; `Ok(None)` when it vanished.
    fn show(&self, object: &str, target: &str) -> Result<Option<Vec<String>>> {
        match self.runner.run(&[self.nmcli.as_str(), object, "show", target], None, true) {
            Ok(out) => Ok(Some(out.stdout)),
            Err(e) if e.is_vanished(self.vanished_code) => {
                debug!("{} {} vanished, discarding it", object, target);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Names of all devices.
    pub fn list_devices(&self) -> Result<Vec<String>> {
        self.list(&["device", "device"])
    }

    /// Settings of each named device.
    pub fn read_devices(&self, names: &[String]) -> Result<BTreeMap<String, LiveDevice>> {
        let mut devices = BTreeMap::new();
        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            if let Some(lines) = self.show("d", name)? {
                devices.insert(name.clone(), parse_device(&lines));
            }
        }
        Ok(devices)
    }

    /// UUIDs of all connections.
    pub fn list_connections(&self) -> Result<Vec<String>> {
        self.list(&["uuid", "c", "show"])
    }

    /// Settings of each connection, keyed by uuid.
    pub fn read_connections(&self, uuids: &[String]) -> Result<BTreeMap<String, LiveConnection>> {
        let mut connections = BTreeMap::new();
        for uuid in uuids.iter().filter(|u| !u.trim().is_empty()) {
            let Some(lines) = self.show("c", uuid)? else {
                continue;
            };
            let mut conn = parse_connection(&lines);
            if let Some(LiveKind::Known(ConnectionKind::Bridge(bridge))) = conn.kind.as_mut() {
                match conn.settings.name.as_deref() {
                    Some(name) => *bridge = ctype::bridge_config(self.engine, name)?,
                    None => warn!("Bridge connection {} has no name", uuid),
                }
            }
            connections.insert(uuid.clone(), conn);
        }
        Ok(connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::mock::{MockEngine, MockRunner};

    const ETH0_SHOW: &str = "\
connection.id:                          eth0
connection.uuid:                        u-eth0
connection.type:                        802-3-ethernet
connection.autoconnect:                 yes
connection.master:                      --
802-3-ethernet.mac-address:             08:00:27:AA:BB:CC
802-3-ethernet.mtu:                     auto
ipv4.method:                            auto
ipv4.dns:                               8.8.8.8,1.1.1.1
ipv4.dns-search:                        --
GENERAL.STATE:                          activated
IP4.ADDRESS[1]:                         192.168.1.5/24
IP4.ADDRESS[2]:                         10.0.0.5/8
IP4.GATEWAY:                            192.168.1.1
IP4.DNS[1]:                             8.8.8.8
IP4.DNS[2]:                             8.8.4.4";

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_field_value() {
        assert_eq!(field_value("GENERAL.HWADDR:   08:00:27:AA:BB:CC").as_deref(), Some("08:00:27:AA:BB:CC"));
        assert_eq!(field_value("ipv4.gateway:     --"), None);
        assert_eq!(field_value("ipv4.gateway:"), None);
        assert_eq!(raw_value("ipv4.gateway:     --").as_deref(), Some("--"));
        assert_eq!(field_value("no separator"), None);
    }

    #[test]
    fn test_parse_connection_fields() {
        let conn = parse_connection(&lines(ETH0_SHOW));
        let s = &conn.settings;
        assert_eq!(s.name.as_deref(), Some("eth0"));
        assert_eq!(s.state.as_deref(), Some("activated"));
        assert!(s.autoconnect);
        assert_eq!(s.ipv4_method.as_deref(), Some("auto"));
        assert_eq!(s.ipv4_addresses.as_deref(), Some("192.168.1.5/24,10.0.0.5/8"));
        assert_eq!(s.ipv4_gw.as_deref(), Some("192.168.1.1"));
        assert_eq!(s.ipv4_dns.as_deref(), Some("8.8.8.8,1.1.1.1,8.8.4.4"));
        assert_eq!(s.ipv4_dns_search, None);
        assert_eq!(conn.master, None);
        assert!(matches!(
            conn.kind,
            Some(LiveKind::Known(ConnectionKind::Ethernet(_)))
        ));
    }

    #[test]
    fn test_dns_flatten_and_dedupe() {
        let conn = parse_connection(&lines("IP4.DNS[1]: 8.8.8.8\nIP4.DNS[2]: 8.8.4.4"));
        assert_eq!(conn.settings.ipv4_dns.as_deref(), Some("8.8.8.8,8.8.4.4"));

        let conn = parse_connection(&lines("IP4.DNS[1]: 8.8.8.8\nIP4.DNS[2]: 8.8.8.8"));
        assert_eq!(conn.settings.ipv4_dns.as_deref(), Some("8.8.8.8"));

        let conn = parse_connection(&lines("connection.id: x"));
        assert_eq!(conn.settings.ipv4_dns, None);
        assert_eq!(conn.settings.ipv4_addresses, None);
    }

    #[test]
    fn test_slave_and_ipv6() {
        let conn = parse_connection(&lines(
            "connection.id: team0-slave-0\n\
             connection.type: 802-3-ethernet\n\
             connection.master: team0\n\
             connection.autoconnect: no\n\
             ipv6.method: ignore\n\
             IP6.ADDRESS[1]: fe80::1/64\n\
             IP6.DNS[1]: fe80::53\n\
             IP6.DNS[2]: fe80::53",
        ));
        assert_eq!(conn.master.as_deref(), Some("team0"));
        assert!(!conn.settings.autoconnect);
        assert_eq!(conn.settings.ipv6_method.as_deref(), Some("ignore"));
        assert_eq!(conn.settings.ipv6_addresses.as_deref(), Some("fe80::1/64"));
        assert_eq!(conn.settings.ipv6_dns.as_deref(), Some("fe80::53"));
    }

    #[test]
    fn test_parse_device() {
        let dev = parse_device(&lines(
            "GENERAL.DEVICE:                         enp0s3\n\
             GENERAL.TYPE:                           ethernet\n\
             GENERAL.HWADDR:                         08:00:27:AA:BB:CC\n\
             GENERAL.MTU:                            1500\n\
             GENERAL.STATE:                          100 (connected)\n\
             GENERAL.CONNECTION:                     eth0",
        ));
        assert_eq!(dev.dtype.as_deref(), Some("ethernet"));
        assert_eq!(dev.mac.as_deref(), Some("08:00:27:AA:BB:CC"));
        assert_eq!(dev.mtu.as_deref(), Some("1500"));
        assert_eq!(dev.state.as_deref(), Some("100 (connected)"));
        assert_eq!(dev.connection.as_deref(), Some("eth0"));

        let dev = parse_device(&lines("GENERAL.CONNECTION: --"));
        assert_eq!(dev.connection, None);
    }

    #[test]
    fn test_read_drops_vanished() {
        let runner = MockRunner::new();
        let engine = MockEngine::default();
        let config = HostConfig::default();
        runner.respond("nmcli -t -f uuid c show", "u-eth0\n\nu-gone\n");
        runner.respond("nmcli c show u-eth0", ETH0_SHOW);
        runner.fail("nmcli c show u-gone", 10);

        let reader = StateReader::new(&config, &runner, &engine);
        let uuids = reader.list_connections().expect("list");
        assert_eq!(uuids, vec!["u-eth0", "u-gone"]);
        let map = reader.read_connections(&uuids).expect("read");
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("u-eth0"));
    }

    #[test]
    fn test_read_devices_drops_vanished() {
        let runner = MockRunner::new();
        let engine = MockEngine::default();
        let config = HostConfig::default();
        runner.respond("nmcli -t -f device device", "enp0s3\nveth9\nlo\n");
        runner.respond("nmcli d show enp0s3", "GENERAL.TYPE: ethernet\nGENERAL.CONNECTION: eth0");
        runner.fail("nmcli d show veth9", 10);
        runner.respond("nmcli d show lo", "GENERAL.TYPE: loopback");

        let reader = StateReader::new(&config, &runner, &engine);
        let names = reader.list_devices().expect("list");
        let devices = reader.read_devices(&names).expect("read");
        assert_eq!(devices.keys().collect::<Vec<_>>(), vec!["enp0s3", "lo"]);
        assert_eq!(devices["enp0s3"].connection.as_deref(), Some("eth0"));
    }

    #[test]
    fn test_read_propagates_other_failures() {
        let runner = MockRunner::new();
        let engine = MockEngine::default();
        let config = HostConfig::default();
        runner.respond("nmcli -t -f device device", "enp0s3\nlo\n");
        runner.fail("nmcli d show lo", 8);

        let reader = StateReader::new(&config, &runner, &engine);
        let names = reader.list_devices().expect("list");
        let err = reader.read_devices(&names).expect_err("should fail");
        assert_eq!(err.exit_code(), Some(8));
    }

    #[test]
    fn test_bridge_enriched_from_engine() {
        let runner = MockRunner::new();
        let engine = MockEngine::running().with_network(
            "bridge",
            "aaaa",
            serde_json::json!({"IPAM": {"Config": [{"Subnet": "172.17.0.0/16", "Gateway": "172.17.0.1"}]}}),
        );
        let config = HostConfig::default();
        runner.respond(
            "nmcli c show u-d0",
            "connection.id: docker0\nconnection.type: bridge",
        );

        let reader = StateReader::new(&config, &runner, &engine);
        let map = reader.read_connections(&["u-d0".to_string()]).expect("read");
        let Some(LiveKind::Known(ConnectionKind::Bridge(bridge))) = &map["u-d0"].kind else {
            panic!("expected bridge");
        };
        assert_eq!(bridge.docker_name.as_deref(), Some("docker0"));
        assert_eq!(bridge.dgateway.as_deref(), Some("172.17.0.1"));
    }
}
