// HostSync - Reconciliation Results
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Summary of a reconciliation pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record counts touched by one pass over one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChanges {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl TableChanges {
    /// Total number of writes.
    pub fn writes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub connections: TableChanges,
    pub devices: TableChanges,
    /// Live connections dropped because they vanished mid-read.
    pub vanished: usize,
    /// Connections of a type HostSync does not model.
    pub unsupported: Vec<String>,
    /// `(slave uuid, master name)` pairs still unresolved after the pass.
    pub unresolved_masters: Vec<(String, String)>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_duration_ms: u64,
}

impl ReconcileReport {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            connections: TableChanges::default(),
            devices: TableChanges::default(),
            vanished: 0,
            unsupported: Vec::new(),
            unresolved_masters: Vec::new(),
            started_at: now,
            completed_at: now,
            total_duration_ms: 0,
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ReconcileReport) {
        self.connections.created += other.connections.created;
        self.connections.updated += other.connections.updated;
        self.connections.deleted += other.connections.deleted;
        self.devices.created += other.devices.created;
        self.devices.updated += other.devices.updated;
        self.devices.deleted += other.devices.deleted;
        self.vanished += other.vanished;
        self.unsupported.extend(other.unsupported);
        self.unresolved_masters.extend(other.unresolved_masters);
    }

    /// Stamp completion time.
    pub fn finalize(&mut self) {
        self.completed_at = Utc::now();
        self.total_duration_ms = (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
    }

    /// Total number of administrative writes.
    pub fn writes(&self) -> usize {
        self.connections.writes() + self.devices.writes()
    }

    /// Whether the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.writes() == 0
    }
}

impl Default for ReconcileReport {
    fn default() -> Self {
        Self::new()
    }
}
