// HostSync - Host Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Host configuration model.
//!
//! Tool paths, MTU limits and the supported team/bond profiles are carried
//! here and handed to each component at construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Path to the NetworkManager CLI.
    #[serde(default = "default_nmcli_path")]
    pub nmcli_path: PathBuf,

    /// Path to the container engine CLI.
    #[serde(default = "default_docker_path")]
    pub docker_path: PathBuf,

    /// Path to systemctl, used to check the container service.
    #[serde(default = "default_systemctl_path")]
    pub systemctl_path: PathBuf,

    /// Systemd unit name of the container engine.
    #[serde(default = "default_container_service")]
    pub container_service: String,

    /// Upper bound for any single external command.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Exit code nmcli uses when the requested object does not exist.
    #[serde(default = "default_vanished_exit_code")]
    pub vanished_exit_code: i32,

    /// MTU assumed when none is given.
    #[serde(default = "default_mtu")]
    pub default_mtu: u32,

    /// Lowest MTU accepted on edits.
    #[serde(default = "default_mtu")]
    pub min_mtu: u32,

    /// Highest MTU accepted on edits.
    #[serde(default = "default_max_mtu")]
    pub max_mtu: u32,

    /// Minimum member devices for team and bond connections.
    #[serde(default = "default_min_members")]
    pub min_aggregate_members: usize,

    /// Team profile name to teamd runner JSON.
    #[serde(default = "default_team_runners")]
    pub team_runners: BTreeMap<String, String>,

    /// Supported bonding modes.
    #[serde(default = "default_bond_modes")]
    pub bond_modes: Vec<String>,

    /// Bridge names owned by the container engine itself.
    #[serde(default = "default_reserved_bridges")]
    pub reserved_bridge_names: Vec<String>,

    /// Connection used for management access; it cannot be deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_connection: Option<String>,

    /// Where the administrative state is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Name-service switch configuration file.
    #[serde(default = "default_nsswitch_path")]
    pub nsswitch_path: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_nmcli_path() -> PathBuf {
    PathBuf::from("/usr/bin/nmcli")
}

fn default_docker_path() -> PathBuf {
    PathBuf::from("/usr/bin/docker")
}

fn default_systemctl_path() -> PathBuf {
    PathBuf::from("/usr/bin/systemctl")
}

fn default_container_service() -> String {
    "docker".to_string()
}

fn default_command_timeout() -> u64 {
    30
}

fn default_vanished_exit_code() -> i32 {
    10
}

fn default_mtu() -> u32 {
    1500
}

fn default_max_mtu() -> u32 {
    9000
}

fn default_min_members() -> usize {
    2
}

fn default_team_runners() -> BTreeMap<String, String> {
    ["broadcast", "roundrobin", "activebackup", "loadbalance", "lacp"]
        .into_iter()
        .map(|name| {
            (
                name.to_string(),
                format!(r#"{{ "runner": {{"name": "{}"}}}}"#, name),
            )
        })
        .collect()
}

fn default_bond_modes() -> Vec<String> {
    [
        "balance-rr",
        "active-backup",
        "balance-xor",
        "broadcast",
        "802.3ad",
        "balance-tlb",
        "balance-alb",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_reserved_bridges() -> Vec<String> {
    vec!["docker0".to_string()]
}

fn default_nsswitch_path() -> PathBuf {
    PathBuf::from("/etc/nsswitch.conf")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            nmcli_path: default_nmcli_path(),
            docker_path: default_docker_path(),
            systemctl_path: default_systemctl_path(),
            container_service: default_container_service(),
            command_timeout_secs: default_command_timeout(),
            vanished_exit_code: default_vanished_exit_code(),
            default_mtu: default_mtu(),
            min_mtu: default_mtu(),
            max_mtu: default_max_mtu(),
            min_aggregate_members: default_min_members(),
            team_runners: default_team_runners(),
            bond_modes: default_bond_modes(),
            reserved_bridge_names: default_reserved_bridges(),
            management_connection: None,
            state_file: None,
            nsswitch_path: default_nsswitch_path(),
            log_level: default_log_level(),
        }
    }
}

impl HostConfig {
    /// Load configuration from TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, super::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| super::Error::ConfigReadFailed(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, super::Error> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to TOML file with restrictive permissions (0600).
    pub fn save_to_file(&self, path: &Path) -> Result<(), super::Error> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }

    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(super::CONFIG_DIR_NAME)
            .join("config.toml")
    }

    /// Command timeout as a duration.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Runner JSON for a team profile.
    pub fn team_runner(&self, profile: &str) -> Option<&str> {
        self.team_runners.get(profile).map(String::as_str)
    }

    /// Check whether a bond mode is supported.
    pub fn supports_bond_mode(&self, mode: &str) -> bool {
        self.bond_modes.iter().any(|m| m == mode)
    }

    /// Check whether a bridge name is reserved for the container engine.
    pub fn is_reserved_bridge(&self, name: &str) -> bool {
        self.reserved_bridge_names
            .iter()
            .any(|reserved| name.contains(reserved.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.default_mtu, 1500);
        assert_eq!(config.max_mtu, 9000);
        assert_eq!(config.vanished_exit_code, 10);
        assert_eq!(config.bond_modes.len(), 7);
        assert_eq!(
            config.team_runner("broadcast"),
            Some(r#"{ "runner": {"name": "broadcast"}}"#)
        );
        assert!(config.team_runner("bogus").is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: HostConfig = toml::from_str(
            r#"
            command_timeout_secs = 5
            management_connection = "eth0"
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(config.command_timeout(), Duration::from_secs(5));
        assert_eq!(config.management_connection.as_deref(), Some("eth0"));
        assert_eq!(config.nmcli_path, PathBuf::from("/usr/bin/nmcli"));
        assert!(config.supports_bond_mode("802.3ad"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut config = HostConfig::default();
        config.max_mtu = 4000;
        config.save_to_file(&path).expect("save");
        let loaded = HostConfig::load_or_default(&path).expect("load");
        assert_eq!(loaded.max_mtu, 4000);
    }

    #[test]
    fn test_reserved_bridge() {
        let config = HostConfig::default();
        assert!(config.is_reserved_bridge("docker0"));
        assert!(!config.is_reserved_bridge("rocknet"));
    }
}
