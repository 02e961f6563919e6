// HostSync - Administrative Store
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Administrative state of the host.
//!
//! The [`Store`] holds the [`Inventory`] of connections, devices and
//! applications behind a single mutex, which serializes reconciliation
//! passes and mutations on the host. Changes are made through
//! [`Store::transaction`]: the closure works on a copy and the copy replaces
//! the committed state only when the closure succeeds.
//!
//! Lock poisoning is recovered from, since a transaction never leaves the
//! committed inventory half-written.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{
    App, ConnectionId, Error, NetworkConnection, NetworkDevice, Result, SchemaVersion,
};

/// Connections, devices and applications known to HostSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    next_id: u64,
    pub connections: BTreeMap<ConnectionId, NetworkConnection>,
    /// Keyed by device name.
    pub devices: BTreeMap<String, NetworkDevice>,
    /// Container networks linked to application containers.
    #[serde(default)]
    pub container_links: BTreeSet<String>,
    #[serde(default)]
    pub apps: BTreeMap<String, App>,
}

impl Inventory {
    /// Allocate a fresh connection id.
    pub fn allocate_id(&mut self) -> ConnectionId {
        self.next_id += 1;
        ConnectionId(self.next_id)
    }

    /// Insert a connection with a fresh id.
    pub fn insert_connection(&mut self, uuid: impl Into<String>) -> &mut NetworkConnection {
        let id = self.allocate_id();
        self.connections
            .entry(id)
            .or_insert_with(|| NetworkConnection::new(id, uuid))
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&NetworkConnection> {
        self.connections.get(&id)
    }

    pub fn connection_by_uuid(&self, uuid: &str) -> Option<&NetworkConnection> {
        self.connections.values().find(|c| c.uuid == uuid)
    }

    /// Id of the connection named `name`, if exactly one has that name.
    pub fn connection_by_name(&self, name: &str) -> Option<ConnectionId> {
        let mut matches = self
            .connections
            .values()
            .filter(|c| c.name() == Some(name))
            .map(|c| c.id);
        match (matches.next(), matches.next()) {
            (Some(id), None) => Some(id),
            _ => None,
        }
    }

    pub fn name_in_use(&self, name: &str) -> bool {
        self.connections.values().any(|c| c.name() == Some(name))
    }

    /// Remove a connection, clearing links to it from devices and members.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<NetworkConnection> {
        let removed = self.connections.remove(&id)?;
        for device in self.devices.values_mut() {
            if device.connection == Some(id) {
                device.connection = None;
            }
        }
        for conn in self.connections.values_mut() {
            if conn.master == Some(id) {
                conn.master = None;
            }
        }
        Some(removed)
    }

    /// Member connections of `master`, ordered by name.
    pub fn slaves_of(&self, master: ConnectionId) -> Vec<&NetworkConnection> {
        let mut slaves: Vec<&NetworkConnection> = self
            .connections
            .values()
            .filter(|c| c.master == Some(master))
            .collect();
        slaves.sort_by(|a, b| a.name().cmp(&b.name()));
        slaves
    }

    /// Name of the connection bound to a device.
    pub fn device_cname(&self, device: &str) -> Option<&str> {
        let id = self.devices.get(device)?.connection?;
        self.connection(id).and_then(NetworkConnection::name)
    }

    /// Name of the application currently in a state transition, if any.
    pub fn pending_app(&self) -> Option<&str> {
        self.apps
            .values()
            .find(|app| app.is_pending())
            .map(|app| app.name.as_str())
    }
}

/// Persisted form of the inventory.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    schema: SchemaVersion,
    inventory: Inventory,
}

/// Transactional administrative store.
#[derive(Debug)]
pub struct Store {
    state_file: Option<PathBuf>,
    inventory: Mutex<Inventory>,
}

impl Store {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::with_inventory(Inventory::default())
    }

    pub fn with_inventory(inventory: Inventory) -> Self {
        Self {
            state_file: None,
            inventory: Mutex::new(inventory),
        }
    }

    /// Open the store, loading `state_file` if it exists.
    pub fn open(state_file: Option<PathBuf>) -> Result<Self> {
        let inventory = match state_file.as_deref() {
            Some(path) if path.exists() => Self::load(path)?,
            _ => Inventory::default(),
        };
        Ok(Self {
            state_file,
            inventory: Mutex::new(inventory),
        })
    }

    fn load(path: &Path) -> Result<Inventory> {
        let file = File::open(path)
            .map_err(|e| Error::ConfigReadFailed(format!("{}: {}", path.display(), e)))?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        if !snapshot.schema.is_compatible() {
            return Err(Error::StateParseFailed(format!(
                "{} has unsupported schema {}",
                path.display(),
                snapshot.schema
            )));
        }
        info!(
            "Loaded {} connections and {} devices from {}",
            snapshot.inventory.connections.len(),
            snapshot.inventory.devices.len(),
            path.display()
        );
        Ok(snapshot.inventory)
    }

    fn persist(&self, inventory: &Inventory) -> Result<()> {
        let Some(path) = self.state_file.as_deref() else {
            return Ok(());
        };
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // Replaced by rename; the temp file is created with mode 0600.
        let snapshot = Snapshot {
            schema: SchemaVersion::current(),
            inventory: inventory.clone(),
        };
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
        drop(writer);
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        debug!("Persisted state to {}", path.display());
        Ok(())
    }

    /// Lock the inventory, recovering from poison if needed.
    fn lock(&self) -> MutexGuard<'_, Inventory> {
        match self.inventory.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Inventory lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Run `f` on a working copy and commit it if `f` succeeds.
    ///
    /// On error the committed inventory is left untouched.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Inventory) -> Result<T>,
    {
        let mut committed = self.lock();
        let mut working = committed.clone();
        let value = f(&mut working)?;
        self.persist(&working)?;
        *committed = working;
        Ok(value)
    }

    /// Read the committed inventory.
    pub fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Inventory) -> T,
    {
        let guard = self.lock();
        f(&guard)
    }

    /// Copy of the committed inventory.
    pub fn snapshot(&self) -> Inventory {
        self.lock().clone()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(inv: &mut Inventory, uuid: &str, name: &str) -> ConnectionId {
        let conn = inv.insert_connection(uuid);
        conn.settings.name = Some(name.to_string());
        conn.id
    }

    #[test]
    fn test_name_lookup_requires_unique() {
        let mut inv = Inventory::default();
        let a = named(&mut inv, "u-1", "eth0");
        named(&mut inv, "u-2", "dup");
        named(&mut inv, "u-3", "dup");
        assert_eq!(inv.connection_by_name("eth0"), Some(a));
        assert_eq!(inv.connection_by_name("dup"), None);
        assert_eq!(inv.connection_by_name("missing"), None);
        assert!(inv.name_in_use("dup"));
    }

    #[test]
    fn test_remove_clears_links() {
        let mut inv = Inventory::default();
        let master = named(&mut inv, "u-m", "team0");
        let slave = named(&mut inv, "u-s", "team0-slave-0");
        inv.connections.get_mut(&slave).expect("slave").master = Some(master);
        let mut dev = NetworkDevice::new("eth1");
        dev.connection = Some(master);
        inv.devices.insert("eth1".into(), dev);

        assert!(inv.remove_connection(master).is_some());
        assert_eq!(inv.connections[&slave].master, None);
        assert_eq!(inv.devices["eth1"].connection, None);
        assert!(inv.remove_connection(master).is_none());
    }

    #[test]
    fn test_slaves_sorted_by_name() {
        let mut inv = Inventory::default();
        let master = named(&mut inv, "u-m", "bond0");
        for (uuid, name) in [("u-b", "bond0-slave-1"), ("u-a", "bond0-slave-0")] {
            let id = named(&mut inv, uuid, name);
            inv.connections.get_mut(&id).expect("slave").master = Some(master);
        }
        let names: Vec<_> = inv.slaves_of(master).iter().filter_map(|c| c.name()).collect();
        assert_eq!(names, vec!["bond0-slave-0", "bond0-slave-1"]);
    }

    #[test]
    fn test_transaction_rolls_back() {
        let store = Store::in_memory();
        let result: Result<()> = store.transaction(|inv| {
            inv.insert_connection("u-1");
            Err(Error::Internal("boom".into()))
        });
        assert!(result.is_err());
        assert!(store.read(|inv| inv.connections.is_empty()));

        store
            .transaction(|inv| {
                inv.insert_connection("u-1");
                Ok(())
            })
            .expect("commit");
        assert_eq!(store.read(|inv| inv.connections.len()), 1);
    }

    #[test]
    fn test_persist_and_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state").join("inventory.json");
        let store = Store::open(Some(path.clone())).expect("open");
        store
            .transaction(|inv| {
                named(inv, "u-1", "eth0");
                inv.devices.insert("eth0".into(), NetworkDevice::new("eth0"));
                Ok(())
            })
            .expect("commit");

        let reopened = Store::open(Some(path)).expect("reopen");
        let inv = reopened.snapshot();
        assert_eq!(inv.connection_by_uuid("u-1").and_then(|c| c.name()), Some("eth0"));
        assert!(inv.devices.contains_key("eth0"));
    }

    #[test]
    fn test_persist_replaces_file_atomically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("inventory.json");
        fs::write(&path, "stale").expect("seed");
        let store = Store::open(None).expect("open");
        let store = Store {
            state_file: Some(path.clone()),
            ..store
        };

        store
            .transaction(|inv| {
                named(inv, "u-1", "eth0");
                Ok(())
            })
            .expect("commit");

        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("list")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("inventory.json")]);
        let snapshot: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(snapshot["schema"], "1.1.0");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_incompatible_schema_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("inventory.json");
        fs::write(
            &path,
            r#"{"schema":"9.0.0","inventory":{"next_id":0,"connections":{},"devices":{}}}"#,
        )
        .expect("seed");
        assert!(matches!(
            Store::open(Some(path)),
            Err(Error::StateParseFailed(_))
        ));
    }
}
