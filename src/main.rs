// HostSync - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # HostSync
//!
//! Command-line front end for host network administration.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use hostsync::models::ConnectionId;
use hostsync::services::{ConnectionRequest, ConnectionUpdate};
use hostsync::system::{nss, Toggle};
use hostsync::{HostConfig, NetworkAdmin, Result};

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "hostsync")]
#[command(about = "Host network administration", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "HOSTSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile connections and devices with NetworkManager
    Refresh,

    /// List connections
    Connections,

    /// List devices
    Devices,

    /// Show one connection
    Show {
        /// Connection id or name
        connection: String,
    },

    /// Create a connection
    #[command(subcommand)]
    Add(AddCmd),

    /// Re-address a connection
    Edit {
        /// Connection id or name
        connection: String,
        #[command(flatten)]
        ipv4: Ipv4Args,
    },

    /// Delete a connection and its members
    Delete {
        /// Connection id or name
        connection: String,
    },

    /// Activate a connection
    Up { connection: String },

    /// Deactivate a connection
    Down { connection: String },

    /// Reload a connection
    Reload { connection: String },

    /// Edit name-service switch providers
    #[command(subcommand)]
    Nss(NssCmd),

    /// Print the effective configuration
    Config {
        /// Write it to the configuration file
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand)]
enum AddCmd {
    /// Ethernet connection on one device
    Ethernet {
        name: String,
        device: String,
        #[command(flatten)]
        ipv4: Ipv4Args,
    },

    /// Team over two or more devices
    Team {
        name: String,
        /// Runner profile, e.g. activebackup
        #[arg(short, long)]
        profile: String,
        #[arg(required = true)]
        devices: Vec<String>,
        #[command(flatten)]
        ipv4: Ipv4Args,
    },

    /// Bond over two or more devices
    Bond {
        name: String,
        /// Bonding mode, e.g. 802.3ad
        #[arg(short, long)]
        mode: String,
        #[arg(required = true)]
        devices: Vec<String>,
        #[command(flatten)]
        ipv4: Ipv4Args,
    },
}

#[derive(Args)]
struct Ipv4Args {
    /// auto or manual
    #[arg(long, default_value = "auto")]
    method: String,

    /// Address with prefix, e.g. 192.168.1.5/24
    #[arg(long)]
    ipaddr: Option<String>,

    #[arg(long)]
    gateway: Option<String>,

    /// Comma-separated DNS servers
    #[arg(long)]
    dns: Option<String>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    mtu: Option<u32>,
}

impl Ipv4Args {
    fn request(self, name: String, ctype: &str) -> ConnectionRequest {
        ConnectionRequest {
            name,
            ctype: ctype.to_string(),
            method: self.method,
            ipaddr: self.ipaddr,
            gateway: self.gateway,
            dns_servers: self.dns,
            search_domains: self.search,
            mtu: self.mtu,
            ..ConnectionRequest::default()
        }
    }

    fn update(self) -> ConnectionUpdate {
        ConnectionUpdate {
            method: self.method,
            ipaddr: self.ipaddr,
            gateway: self.gateway,
            dns_servers: self.dns,
            search_domains: self.search,
            mtu: self.mtu,
        }
    }
}

#[derive(Subcommand)]
enum NssCmd {
    /// Add a provider to the passwd and group databases
    Enable(NssArgs),

    /// Remove a provider from the passwd and group databases
    Disable(NssArgs),
}

#[derive(Args)]
struct NssArgs {
    #[arg(default_value = "sss")]
    provider: String,

    /// Databases to edit
    #[arg(long, value_delimiter = ',', default_value = "passwd,group")]
    databases: Vec<String>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(config: &HostConfig, debug: bool) {
    let level = if debug { "debug" } else { config.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, config_path: PathBuf, config: HostConfig) -> Result<()> {
    let command = cli.command;

    // Commands that do not touch NetworkManager.
    match &command {
        Command::Config { write } => {
            if *write {
                if let Some(dir) = config_path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                config.save_to_file(&config_path)?;
                tracing::info!("Wrote {}", config_path.display());
            }
            print!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        Command::Nss(cmd) => {
            let (args, remove) = match cmd {
                NssCmd::Enable(args) => (args, false),
                NssCmd::Disable(args) => (args, true),
            };
            let databases: Vec<&str> = args.databases.iter().map(String::as_str).collect();
            return nss::update_nss(&config.nsswitch_path, &databases, &args.provider, remove);
        }
        _ => {}
    }

    let admin = NetworkAdmin::system(config)?;
    let resolve = |key: &str| -> Result<ConnectionId> { admin.resolve(key) };

    match command {
        Command::Refresh => print_json(&admin.refresh_state()?),
        Command::Connections => print_json(&admin.list_connections()?),
        Command::Devices => print_json(&admin.list_devices()?),
        Command::Show { connection } => print_json(&admin.get_connection(resolve(&connection)?)?),
        Command::Add(add) => {
            let request = match add {
                AddCmd::Ethernet { name, device, ipv4 } => ConnectionRequest {
                    device: Some(device),
                    ..ipv4.request(name, "ethernet")
                },
                AddCmd::Team {
                    name,
                    profile,
                    devices,
                    ipv4,
                } => ConnectionRequest {
                    devices,
                    team_profile: Some(profile),
                    ..ipv4.request(name, "team")
                },
                AddCmd::Bond {
                    name,
                    mode,
                    devices,
                    ipv4,
                } => ConnectionRequest {
                    devices,
                    bond_profile: Some(mode),
                    ..ipv4.request(name, "bond")
                },
            };
            print_json(&admin.create_connection(&request)?)
        }
        Command::Edit { connection, ipv4 } => {
            let id = resolve(&connection)?;
            print_json(&admin.update_connection(id, &ipv4.update())?)
        }
        Command::Delete { connection } => {
            admin.delete_connection(resolve(&connection)?)?;
            print_json(&serde_json::json!({ "deleted": connection }))
        }
        Command::Up { connection } => print_json(&admin.toggle_connection(resolve(&connection)?, Toggle::Up)?),
        Command::Down { connection } => print_json(&admin.toggle_connection(resolve(&connection)?, Toggle::Down)?),
        Command::Reload { connection } => {
            print_json(&admin.toggle_connection(resolve(&connection)?, Toggle::Reload)?)
        }
        Command::Config { .. } | Command::Nss(_) => Ok(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(HostConfig::default_path);
    let config = match HostConfig::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.response_body());
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.debug);
    tracing::debug!("hostsync v{} using {}", VERSION, config_path.display());

    match run(cli, config_path, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            println!("{}", e.response_body());
            ExitCode::FAILURE
        }
    }
}
