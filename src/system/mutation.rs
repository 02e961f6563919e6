// HostSync - Connection Mutation Driver
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Imperative connection changes through `nmcli`.
//!
//! Every step fails fast: a non-zero exit from any call aborts the sequence.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use super::command::{CommandOutput, CommandRunner};
use crate::models::{Error, HostConfig, Result};

/// Optional IPv4 settings applied after a connection is added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ipv4Settings {
    /// Address with prefix, e.g. `192.168.1.5/24`.
    pub address: Option<String>,
    pub gateway: Option<String>,
    /// Comma-separated servers.
    pub dns: Option<String>,
    pub search: Option<String>,
}

/// Activation state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Up,
    Down,
    Reload,
}

impl Toggle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Reload => "reload",
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Toggle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "reload" => Ok(Self::Reload),
            other => Err(Error::ValidationFailed(format!(
                "Unknown switch ({}). Use up, down or reload.",
                other
            ))),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Name of the `index`th member connection of `master`.
pub fn slave_name(master: &str, index: usize) -> String {
    format!("{}-slave-{}", master, index)
}

/// Issues connection mutations.
pub struct MutationDriver<'a> {
    runner: &'a dyn CommandRunner,
    nmcli: String,
    default_mtu: u32,
}

impl<'a> MutationDriver<'a> {
    pub fn new(config: &HostConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            nmcli: config.nmcli_path.to_string_lossy().into_owned(),
            default_mtu: config.default_mtu,
        }
    }

    fn nmcli(&self, args: &[&str], throw: bool) -> Result<CommandOutput> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(self.nmcli.as_str());
        argv.extend_from_slice(args);
        self.runner.run(&argv, None, throw)
    }

    fn modify(&self, name: &str, setting: &str, value: &str) -> Result<()> {
        self.nmcli(&["c", "mod", name, setting, value], true)?;
        Ok(())
    }

    /// Apply IPv4 settings and MTU to `name`.
    ///
    /// Only supplied fields are written. The method switches to manual only
    /// when an address is given; the MTU is written only when it differs from
    /// the default.
    fn apply_ipv4(&self, name: &str, ipv4: &Ipv4Settings, mtu: u32) -> Result<()> {
        let address = present(&ipv4.address);
        if let Some(address) = address {
            self.modify(name, "ipv4.addresses", address)?;
        }
        if let Some(gateway) = present(&ipv4.gateway) {
            self.modify(name, "ipv4.gateway", gateway)?;
        }
        if address.is_some() {
            self.modify(name, "ipv4.method", "manual")?;
        }
        if let Some(dns) = present(&ipv4.dns) {
            self.modify(name, "ipv4.dns", dns)?;
        }
        if let Some(search) = present(&ipv4.search) {
            self.modify(name, "ipv4.dns-search", search)?;
        }
        if mtu != self.default_mtu {
            self.modify(name, "802-3-ethernet.mtu", &mtu.to_string())?;
        }
        Ok(())
    }

    /// Add one member connection per device, then bring them up in order.
    fn add_members(&self, master: &str, members: &[String], member_type: &str) -> Result<()> {
        for (index, device) in members.iter().enumerate() {
            let member = slave_name(master, index);
            self.nmcli(
                &["c", "add", "type", member_type, "con-name", member.as_str(), "ifname", device.as_str(), "master", master],
                true,
            )?;
        }
        for index in 0..members.len() {
            self.nmcli(&["c", "up", slave_name(master, index).as_str()], true)?;
        }
        Ok(())
    }

    pub fn create_ethernet(&self, name: &str, device: &str, ipv4: &Ipv4Settings, mtu: u32) -> Result<()> {
        info!("Creating ethernet connection {} on {}", name, device);
        self.nmcli(&["c", "add", "type", "ethernet", "con-name", name, "ifname", device], true)?;
        self.apply_ipv4(name, ipv4, mtu)?;
        self.toggle(name, Toggle::Reload)
    }

    /// Create a team with `config` as its teamd runner JSON.
    pub fn create_team(
        &self,
        name: &str,
        config: &str,
        members: &[String],
        ipv4: &Ipv4Settings,
        mtu: u32,
    ) -> Result<()> {
        info!("Creating team connection {} over {:?}", name, members);
        self.nmcli(
            &["c", "add", "type", "team", "con-name", name, "ifname", name, "config", config],
            true,
        )?;
        self.apply_ipv4(name, ipv4, mtu)?;
        self.add_members(name, members, "team-slave")?;
        self.toggle(name, Toggle::Reload)
    }

    pub fn create_bond(&self, name: &str, mode: &str, members: &[String], ipv4: &Ipv4Settings) -> Result<()> {
        info!("Creating bond connection {} ({}) over {:?}", name, mode, members);
        self.nmcli(
            &["c", "add", "type", "bond", "con-name", name, "ifname", name, "mode", mode],
            true,
        )?;
        self.apply_ipv4(name, ipv4, self.default_mtu)?;
        self.add_members(name, members, "bond-slave")?;
        self.toggle(name, Toggle::Reload)
    }

    /// Change the activation state of a connection given by uuid or name.
    pub fn toggle(&self, target: &str, switch: Toggle) -> Result<()> {
        debug!("Connection {} {}", target, switch);
        self.nmcli(&["c", switch.as_str(), target], true)?;
        Ok(())
    }

    /// Whether NetworkManager still knows the connection.
    pub fn valid_connection(&self, uuid: &str) -> Result<bool> {
        Ok(self.nmcli(&["c", "show", uuid], false)?.success())
    }

    /// Delete a connection if it still exists.
    ///
    /// Returns whether a delete was issued.
    pub fn delete(&self, uuid: &str) -> Result<bool> {
        if !self.valid_connection(uuid)? {
            debug!("Connection {} already gone, nothing to delete", uuid);
            return Ok(false);
        }
        info!("Deleting connection {}", uuid);
        self.nmcli(&["c", "delete", uuid], true)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::mock::MockRunner;

    fn devices(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_team_broadcast_sequence() {
        let runner = MockRunner::new();
        let config = HostConfig::default();
        let driver = MutationDriver::new(&config, &runner);
        let runner_json = config.team_runner("broadcast").expect("profile");

        driver
            .create_team("team0", runner_json, &devices(&["eth1", "eth2"]), &Ipv4Settings::default(), 1500)
            .expect("create");

        assert_eq!(
            runner.calls(),
            vec![
                format!("nmcli c add type team con-name team0 ifname team0 config {}", runner_json),
                "nmcli c add type team-slave con-name team0-slave-0 ifname eth1 master team0".to_string(),
                "nmcli c add type team-slave con-name team0-slave-1 ifname eth2 master team0".to_string(),
                "nmcli c up team0-slave-0".to_string(),
                "nmcli c up team0-slave-1".to_string(),
                "nmcli c reload team0".to_string(),
            ]
        );
    }

    #[test]
    fn test_ipv4_helper_writes_only_given_fields() {
        let runner = MockRunner::new();
        let config = HostConfig::default();
        let driver = MutationDriver::new(&config, &runner);
        let ipv4 = Ipv4Settings {
            address: Some("192.168.1.5/24".into()),
            gateway: Some("  ".into()),
            dns: Some("8.8.8.8".into()),
            search: None,
        };

        driver.create_ethernet("lan", "eth1", &ipv4, 9000).expect("create");

        assert_eq!(
            runner.calls(),
            vec![
                "nmcli c add type ethernet con-name lan ifname eth1",
                "nmcli c mod lan ipv4.addresses 192.168.1.5/24",
                "nmcli c mod lan ipv4.method manual",
                "nmcli c mod lan ipv4.dns 8.8.8.8",
                "nmcli c mod lan 802-3-ethernet.mtu 9000",
                "nmcli c reload lan",
            ]
        );
    }

    #[test]
    fn test_dhcp_default_mtu_has_no_mods() {
        let runner = MockRunner::new();
        let config = HostConfig::default();
        let driver = MutationDriver::new(&config, &runner);
        driver
            .create_bond("bond0", "active-backup", &devices(&["eth1", "eth2"]), &Ipv4Settings::default())
            .expect("create");
        assert!(runner.calls_with("nmcli c mod").is_empty());
        assert_eq!(runner.calls_with("nmcli c add type bond-slave").len(), 2);
    }

    #[test]
    fn test_failure_aborts_sequence() {
        let runner = MockRunner::new();
        runner.fail("nmcli c add type team-slave con-name team0-slave-0 ifname eth1 master team0", 4);
        let config = HostConfig::default();
        let driver = MutationDriver::new(&config, &runner);

        let err = driver
            .create_team("team0", "{}", &devices(&["eth1", "eth2"]), &Ipv4Settings::default(), 1500)
            .expect_err("should fail");
        assert_eq!(err.exit_code(), Some(4));
        assert!(runner.calls_with("nmcli c up").is_empty());
    }

    #[test]
    fn test_delete_is_guarded() {
        let runner = MockRunner::new();
        runner.fail("nmcli c show u-gone", 10);
        let config = HostConfig::default();
        let driver = MutationDriver::new(&config, &runner);

        assert!(!driver.delete("u-gone").expect("no-op"));
        assert!(runner.calls_with("nmcli c delete").is_empty());

        assert!(driver.delete("u-live").expect("delete"));
        assert_eq!(runner.calls_with("nmcli c delete"), vec!["nmcli c delete u-live"]);
    }

    #[test]
    fn test_toggle_parse() {
        assert_eq!("down".parse::<Toggle>().ok(), Some(Toggle::Down));
        assert!("sideways".parse::<Toggle>().is_err());
    }
}
