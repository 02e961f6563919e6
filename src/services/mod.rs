// HostSync - Services
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Host administration services.
//!
//! - **reconcile**: Keeps the inventory in step with NetworkManager
//! - **admin**: Validated connection and device administration
//! - **apps**: Containerized application lifecycle

pub mod admin;
pub mod apps;
pub mod reconcile;

pub use admin::{ConnectionRequest, ConnectionUpdate, ConnectionView, DeviceView, NetworkAdmin};
pub use apps::{AppHandler, AppManager, AppOperation, GenericHandler, HandlerRegistry, QueueExecutor, TaskExecutor};
pub use reconcile::Reconciler;
