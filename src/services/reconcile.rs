// HostSync - Reconciliation Engine
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Two-way synchronization of the inventory with NetworkManager.
//!
//! A pass makes the inventory mirror the live snapshot:
//!
//! 1. Records whose uuid is gone are deleted.
//! 2. Every live connection is updated in place or created, and its type
//!    payload upserted. Master links are only queued at this point.
//! 3. Queued master links are resolved by name against the complete set of
//!    records, so a member seen before its master still links to it.
//!
//! Devices follow the same shape keyed by name. Nothing is written for a
//! record that did not change, so a second pass over the same snapshot is a
//! no-op.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::models::{
    BridgeConfig, ConnectionId, ConnectionKind, HostConfig, LiveConnection, LiveDevice, LiveKind,
    NetworkDevice, ReconcileReport, Result,
};
use crate::storage::Inventory;
use crate::system::{CommandRunner, ContainerEngine, StateReader};

/// Master link awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingMaster {
    id: ConnectionId,
    uuid: String,
    /// Master name reported live; `None` clears the link.
    master: Option<String>,
}

/// Runs reconciliation passes against the live host.
pub struct Reconciler<'a> {
    config: &'a HostConfig,
    reader: StateReader<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a HostConfig, runner: &'a dyn CommandRunner, engine: &'a dyn ContainerEngine) -> Self {
        Self {
            config,
            reader: StateReader::new(config, runner, engine),
        }
    }

    /// Reconcile connections with the live snapshot.
    pub fn refresh_connections(&self, inventory: &mut Inventory) -> Result<ReconcileReport> {
        let uuids = self.reader.list_connections()?;
        let live = self.reader.read_connections(&uuids)?;
        let vanished = uuids.len().saturating_sub(live.len());
        let mut report = apply_connections(self.config, inventory, live);
        report.vanished = vanished;
        report.finalize();
        Ok(report)
    }

    /// Reconcile devices with the live snapshot.
    pub fn refresh_devices(&self, inventory: &mut Inventory) -> Result<ReconcileReport> {
        let names = self.reader.list_devices()?;
        let live = self.reader.read_devices(&names)?;
        let vanished = names.len().saturating_sub(live.len());
        let mut report = apply_devices(inventory, live);
        report.vanished = vanished;
        report.finalize();
        Ok(report)
    }

    /// Connections first, so devices can link to fresh records.
    pub fn refresh_all(&self, inventory: &mut Inventory) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        report.merge(self.refresh_connections(inventory)?);
        report.merge(self.refresh_devices(inventory)?);
        report.finalize();
        info!(
            "Reconciled: connections {:?}, devices {:?}, vanished {} ({} ms)",
            report.connections, report.devices, report.vanished, report.total_duration_ms
        );
        Ok(report)
    }
}

/// Apply a live connection snapshot keyed by uuid.
pub fn apply_connections(
    config: &HostConfig,
    inventory: &mut Inventory,
    mut live: BTreeMap<String, LiveConnection>,
) -> ReconcileReport {
    let mut report = ReconcileReport::new();
    let mut pending = Vec::new();
    let mut touched = BTreeSet::new();

    let existing: Vec<(ConnectionId, String)> = inventory
        .connections
        .values()
        .map(|c| (c.id, c.uuid.clone()))
        .collect();

    for (id, uuid) in existing {
        match live.remove(&uuid) {
            Some(conn) => {
                if update_connection(config, inventory, id, conn, &mut pending, &mut report) {
                    touched.insert(id);
                }
            }
            None => {
                debug!("Connection {} no longer exists, deleting", uuid);
                inventory.remove_connection(id);
                report.connections.deleted += 1;
            }
        }
    }

    let mut created = BTreeSet::new();
    for (uuid, conn) in live {
        let id = inventory.insert_connection(uuid.as_str()).id;
        debug!("New connection {}", uuid);
        update_connection(config, inventory, id, conn, &mut pending, &mut report);
        created.insert(id);
    }
    report.connections.created = created.len();

    for edge in pending {
        if resolve_master(inventory, &edge, &mut report) && !created.contains(&edge.id) {
            touched.insert(edge.id);
        }
    }
    report.connections.updated = touched.len();
    report
}

/// Update one record from its live state. Returns whether anything changed.
fn update_connection(
    config: &HostConfig,
    inventory: &mut Inventory,
    id: ConnectionId,
    live: LiveConnection,
    pending: &mut Vec<PendingMaster>,
    report: &mut ReconcileReport,
) -> bool {
    let LiveConnection { settings, master, kind } = live;
    let Some(record) = inventory.connections.get_mut(&id) else {
        return false;
    };
    let linked = &inventory.container_links;

    pending.push(PendingMaster {
        id,
        uuid: record.uuid.clone(),
        master,
    });

    let mut changed = false;
    match kind {
        Some(LiveKind::Known(kind)) => {
            let name = settings.name.as_deref().unwrap_or_default();
            let kind = upsert_kind(config, linked, name, record.kind.as_ref(), kind);
            if record.kind.as_ref() != Some(&kind) {
                record.kind = Some(kind);
                changed = true;
            }
        }
        Some(LiveKind::Unsupported(ctype)) => {
            warn!(
                "Unknown connection type {} for {}, type settings not stored",
                ctype, record.uuid
            );
            report.unsupported.push(record.uuid.clone());
        }
        None => {}
    }

    if record.settings != settings {
        record.settings = settings;
        changed = true;
    }
    changed
}

/// Merge a live type payload into the stored one.
///
/// Team and bond payloads take the connection name. A bridge whose engine
/// metadata could not be read keeps its stored payload; otherwise the
/// administrator flag is computed from the engine network name and, once
/// set, never cleared.
fn upsert_kind(
    config: &HostConfig,
    container_links: &BTreeSet<String>,
    name: &str,
    existing: Option<&ConnectionKind>,
    live: ConnectionKind,
) -> ConnectionKind {
    match live {
        ConnectionKind::Team(mut team) => {
            team.name = Some(name.to_string());
            ConnectionKind::Team(team)
        }
        ConnectionKind::Bond(mut bond) => {
            bond.name = Some(name.to_string());
            ConnectionKind::Bond(bond)
        }
        ConnectionKind::Bridge(bridge) => {
            let previous = match existing {
                Some(ConnectionKind::Bridge(prev)) => Some(prev),
                _ => None,
            };
            let Some(docker_name) = bridge.docker_name.clone() else {
                return ConnectionKind::Bridge(previous.cloned().unwrap_or(bridge));
            };
            let usercon = previous.map(|p| p.usercon).unwrap_or(false)
                || (!config.is_reserved_bridge(&docker_name) && !container_links.contains(&docker_name));
            ConnectionKind::Bridge(BridgeConfig { usercon, ..bridge })
        }
        ethernet => ethernet,
    }
}

/// Set the master link of one record. Returns whether it changed.
fn resolve_master(inventory: &mut Inventory, edge: &PendingMaster, report: &mut ReconcileReport) -> bool {
    let target = match edge.master.as_deref() {
        None => None,
        Some(name) => match inventory.connection_by_name(name) {
            Some(master) => Some(master),
            None => {
                warn!(
                    "Master {} of connection {} not found or ambiguous, link left unchanged",
                    name, edge.uuid
                );
                report.unresolved_masters.push((edge.uuid.clone(), name.to_string()));
                return false;
            }
        },
    };

    match inventory.connections.get_mut(&edge.id) {
        Some(record) if record.master != target => {
            record.master = target;
            true
        }
        _ => false,
    }
}

/// Apply a live device snapshot keyed by device name.
pub fn apply_devices(inventory: &mut Inventory, mut live: BTreeMap<String, LiveDevice>) -> ReconcileReport {
    let mut report = ReconcileReport::new();
    let names: Vec<String> = inventory.devices.keys().cloned().collect();

    for name in names {
        match live.remove(&name) {
            Some(dev) => {
                let updated = device_record(inventory, &name, dev);
                if inventory.devices.get(&name) != Some(&updated) {
                    inventory.devices.insert(name, updated);
                    report.devices.updated += 1;
                }
            }
            None => {
                debug!("Device {} no longer exists, deleting", name);
                inventory.devices.remove(&name);
                report.devices.deleted += 1;
            }
        }
    }

    for (name, dev) in live {
        let record = device_record(inventory, &name, dev);
        inventory.devices.insert(name, record);
        report.devices.created += 1;
    }
    report
}

fn device_record(inventory: &Inventory, name: &str, live: LiveDevice) -> NetworkDevice {
    let connection = live.connection.as_deref().and_then(|cname| {
        let id = inventory.connection_by_name(cname);
        if id.is_none() {
            warn!("Connection {} of device {} not found or ambiguous", cname, name);
        }
        id
    });
    NetworkDevice {
        name: name.to_string(),
        dtype: live.dtype,
        mac: live.mac,
        mtu: live.mtu,
        state: live.state,
        connection,
    }
}
