// HostSync - Application Data Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Containerized applications managed on the host.

use serde::{Deserialize, Serialize};

/// Installation state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    #[default]
    Available,
    PendingInstall,
    Installed,
    PendingUninstall,
    InstallFailed,
    UninstallFailed,
}

impl AppState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingInstall | Self::PendingUninstall)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::PendingInstall => "pending_install",
            Self::Installed => "installed",
            Self::PendingUninstall => "pending_uninstall",
            Self::InstallFailed => "install_failed",
            Self::UninstallFailed => "uninstall_failed",
        }
    }
}

/// Run status of an installed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppStatus {
    #[default]
    Stopped,
    PendingStart,
    Started,
    PendingStop,
    Failed,
}

impl AppStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingStart | Self::PendingStop)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::PendingStart => "pending_start",
            Self::Started => "started",
            Self::PendingStop => "pending_stop",
            Self::Failed => "failed",
        }
    }
}

/// One container of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppContainer {
    pub name: String,
    pub image: String,
    /// Extra `docker run` arguments (ports, volumes, env).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_args: Vec<String>,
}

/// An application and its containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    /// Unique identifier, also used to select a custom handler.
    pub name: String,
    #[serde(default)]
    pub state: AppState,
    #[serde(default)]
    pub status: AppStatus,
    #[serde(default)]
    pub containers: Vec<AppContainer>,
    /// Container networks the application links its containers through.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: AppState::Available,
            status: AppStatus::Stopped,
            containers: Vec::new(),
            networks: Vec::new(),
        }
    }

    /// Whether a state transition is in flight.
    pub fn is_pending(&self) -> bool {
        self.state.is_pending() || self.status.is_pending()
    }

    /// Whether the application is running or about to.
    pub fn is_running(&self) -> bool {
        matches!(self.status, AppStatus::Started | AppStatus::PendingStart)
    }
}
