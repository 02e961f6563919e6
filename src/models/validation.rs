// HostSync - Validation Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Input validation for administrative requests.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use super::config::HostConfig;
use super::error::{Error, Result};

/// Validate an IPv4 address string.
pub fn validate_ipv4(s: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(s).map_err(|_| Error::InvalidIpAddress(s.to_string()))
}

/// Validate an IP address string (v4 or v6).
pub fn validate_ip(s: &str) -> Result<IpAddr> {
    IpAddr::from_str(s).map_err(|_| Error::InvalidIpAddress(s.to_string()))
}

/// Validate an address with optional prefix (e.g., "192.168.1.2/24").
///
/// A missing prefix means /32, as nmcli assumes.
pub fn validate_ipv4_cidr(s: &str) -> Result<(Ipv4Addr, u8)> {
    let (addr, prefix) = match s.split_once('/') {
        Some((addr, prefix)) => {
            let prefix: u8 = prefix
                .parse()
                .map_err(|_| Error::InvalidIpAddress(format!("Invalid prefix: {}", s)))?;
            (addr, prefix)
        }
        None => (s, 32),
    };
    if prefix > 32 {
        return Err(Error::InvalidIpAddress(format!(
            "Prefix {} exceeds maximum 32: {}",
            prefix, s
        )));
    }
    Ok((validate_ipv4(addr)?, prefix))
}

/// Validate a comma-separated list of DNS servers.
pub fn validate_dns_servers(s: &str) -> Result<Vec<IpAddr>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(validate_ip)
        .collect()
}

/// Validate an MTU against the configured edit range.
pub fn validate_mtu(mtu: u32, config: &HostConfig) -> Result<u32> {
    if !(config.min_mtu..=config.max_mtu).contains(&mtu) {
        return Err(Error::InvalidMtu {
            min: config.min_mtu,
            max: config.max_mtu,
        });
    }
    Ok(mtu)
}

/// Validate a connection name.
pub fn validate_connection_name(s: &str) -> Result<String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::ValidationFailed(
            "Connection name cannot be empty".to_string(),
        ));
    }
    if s.len() > 256 {
        return Err(Error::ValidationFailed(
            "Connection name must be 256 characters or less".to_string(),
        ));
    }
    Ok(s.to_string())
}

/// Validate a team profile name against the configured runners.
pub fn validate_team_profile<'a>(profile: &str, config: &'a HostConfig) -> Result<&'a str> {
    config.team_runner(profile).ok_or_else(|| Error::UnsupportedProfile {
        kind: "team".to_string(),
        profile: profile.to_string(),
        supported: config
            .team_runners
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Validate a bond mode against the configured modes.
pub fn validate_bond_profile(profile: &str, config: &HostConfig) -> Result<()> {
    if config.supports_bond_mode(profile) {
        Ok(())
    } else {
        Err(Error::UnsupportedProfile {
            kind: "bond".to_string(),
            profile: profile.to_string(),
            supported: config.bond_modes.join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mtu_range() {
        let config = HostConfig::default();
        assert!(validate_mtu(1499, &config).is_err());
        assert!(validate_mtu(9001, &config).is_err());
        assert_eq!(validate_mtu(1500, &config).ok(), Some(1500));
        assert_eq!(validate_mtu(9000, &config).ok(), Some(9000));
    }

    #[test]
    fn test_validate_cidr() {
        assert!(validate_ipv4_cidr("192.168.1.2/24").is_ok());
        assert_eq!(
            validate_ipv4_cidr("192.168.1.2").ok().map(|(_, p)| p),
            Some(32)
        );
        assert!(validate_ipv4_cidr("192.168.1.0/33").is_err());
        assert!(validate_ipv4_cidr("not-an-ip/24").is_err());
    }

    #[test]
    fn test_dns_servers() {
        assert_eq!(validate_dns_servers("8.8.8.8, 8.8.4.4").map(|v| v.len()).ok(), Some(2));
        assert!(validate_dns_servers("8.8.8.8,bogus").is_err());
    }

    #[test]
    fn test_profiles() {
        let config = HostConfig::default();
        assert!(validate_team_profile("broadcast", &config).is_ok());
        assert!(validate_team_profile("bogus", &config).is_err());
        assert!(validate_bond_profile("active-backup", &config).is_ok());
        assert!(validate_bond_profile("roundrobin", &config).is_err());
    }

    #[test]
    fn test_connection_name() {
        assert_eq!(validate_connection_name("  team0 ").ok().as_deref(), Some("team0"));
        assert!(validate_connection_name("   ").is_err());
    }
}
