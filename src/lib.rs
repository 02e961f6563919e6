// HostSync - Library Root
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # HostSync
//!
//! Host-management control plane for Linux. HostSync keeps an administrative
//! inventory of network connections, devices and containerized applications
//! in step with the live host by driving NetworkManager (`nmcli`), the
//! container engine (`docker`) and `systemctl`.
//!
//! ## Layout
//!
//! - [`models`]: Data types, configuration, validation and errors
//! - [`system`]: Wrappers around the external tools
//! - [`services`]: Reconciliation engine, administrative façade, applications
//! - [`storage`]: Transactional administrative store

pub mod models;
pub mod services;
pub mod storage;
pub mod system;

pub use models::{Error, HostConfig, Result};
pub use services::{NetworkAdmin, Reconciler};
pub use storage::{Inventory, Store};
