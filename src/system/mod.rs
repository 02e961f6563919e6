// HostSync - System Tools
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Wrappers around the host tools HostSync drives.
//!
//! - **command**: Process execution with bounded timeouts
//! - **nmcli**: Live device and connection state
//! - **ctype**: Connection type classification and bridge metadata
//! - **docker**: Container engine access
//! - **mutation**: Connection create/modify/activate/delete sequences
//! - **nss**: Name-service switch provider editing

pub mod command;
pub mod ctype;
pub mod docker;
pub mod mutation;
pub mod nmcli;
pub mod nss;

#[cfg(test)]
pub mod mock;

pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use docker::{ContainerEngine, DockerCli, NetworkType};
pub use mutation::{Ipv4Settings, MutationDriver, Toggle};
pub use nmcli::StateReader;
