// HostSync - Data Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # HostSync Data Models
//!
//! Types shared by the system wrappers, the reconciliation engine and the
//! administrative façade:
//!
//! - **Connection**: NetworkManager connection profiles and their typed payloads
//! - **Device**: Interfaces discovered on the host
//! - **App**: Containerized applications and their transition states
//! - **Config**: Host configuration (tool paths, MTU limits, profiles)
//! - **Result**: Reconciliation pass summaries
//! - **Error**: Shared error types

pub mod app;
pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod result;
pub mod schema;
pub mod validation;

pub use app::{App, AppContainer, AppState, AppStatus};
pub use config::HostConfig;
pub use connection::{
    BondConfig, BridgeConfig, ConnectionId, ConnectionKind, ConnectionSettings, EthernetConfig,
    Ipv4Method, LiveConnection, LiveKind, NetworkConnection, TeamConfig,
};
pub use device::{LiveDevice, NetworkDevice};
pub use error::{Error, Result};
pub use result::{ReconcileReport, TableChanges};
pub use schema::SchemaVersion;

/// Configuration directory name (under XDG_CONFIG_HOME).
pub const CONFIG_DIR_NAME: &str = "hostsync";
