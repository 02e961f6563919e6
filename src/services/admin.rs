// HostSync - Administrative Facade
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Connection and device administration.
//!
//! Every operation runs inside one [`Store::transaction`]: validation and
//! command failures leave the inventory exactly as it was.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::reconcile::Reconciler;
use crate::models::validation::{
    validate_bond_profile, validate_connection_name, validate_dns_servers, validate_ipv4,
    validate_ipv4_cidr, validate_mtu, validate_team_profile,
};
use crate::models::{
    ConnectionId, ConnectionKind, Error, HostConfig, Ipv4Method, NetworkConnection, NetworkDevice,
    ReconcileReport, Result,
};
use crate::storage::{Inventory, Store};
use crate::system::{
    CommandRunner, ContainerEngine, DockerCli, Ipv4Settings, MutationDriver, SystemRunner, Toggle,
};

/// Connection types an administrator can create.
const CREATABLE_TYPES: [&str; 3] = ["ethernet", "team", "bond"];

/// Request to create a connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub name: String,
    /// `ethernet`, `team` or `bond`.
    pub ctype: String,
    /// `auto` or `manual`.
    pub method: String,
    /// Device for an ethernet connection.
    pub device: Option<String>,
    /// Member devices for a team or bond.
    #[serde(default)]
    pub devices: Vec<String>,
    pub team_profile: Option<String>,
    pub bond_profile: Option<String>,
    /// Address with optional prefix; only read for `manual`.
    pub ipaddr: Option<String>,
    pub gateway: Option<String>,
    pub dns_servers: Option<String>,
    pub search_domains: Option<String>,
    pub mtu: Option<u32>,
}

/// Request to edit a connection's addressing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    /// `auto` or `manual`.
    pub method: String,
    pub ipaddr: Option<String>,
    pub gateway: Option<String>,
    pub dns_servers: Option<String>,
    pub search_domains: Option<String>,
    pub mtu: Option<u32>,
}

/// Connection as presented to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionView {
    #[serde(flatten)]
    pub connection: NetworkConnection,
    pub ctype: Option<&'static str>,
    pub ipaddr: Option<String>,
    pub mtu: u32,
    pub team_profile: Option<String>,
    pub bond_profile: Option<String>,
    pub docker_name: Option<String>,
    /// Name of the master connection.
    pub master_name: Option<String>,
}

impl ConnectionView {
    fn new(inventory: &Inventory, conn: &NetworkConnection, default_mtu: u32) -> Self {
        Self {
            ctype: conn.ctype(),
            ipaddr: conn.ipaddr().map(String::from),
            mtu: conn.mtu(default_mtu),
            team_profile: conn.team_profile(),
            bond_profile: conn.bond_profile(),
            docker_name: conn.docker_name().map(String::from),
            master_name: conn
                .master
                .and_then(|id| inventory.connection(id))
                .and_then(NetworkConnection::name)
                .map(String::from),
            connection: conn.clone(),
        }
    }
}

/// Device as presented to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    #[serde(flatten)]
    pub device: NetworkDevice,
    /// Name of the bound connection.
    pub cname: Option<String>,
    pub managed: bool,
}

/// Entry point for network administration on one host.
pub struct NetworkAdmin {
    config: HostConfig,
    runner: Arc<dyn CommandRunner>,
    engine: Box<dyn ContainerEngine>,
    store: Store,
}

impl NetworkAdmin {
    pub fn new(
        config: HostConfig,
        runner: Arc<dyn CommandRunner>,
        engine: Box<dyn ContainerEngine>,
        store: Store,
    ) -> Self {
        Self {
            config,
            runner,
            engine,
            store,
        }
    }

    /// Wire the façade to the real host tools and the configured state file.
    pub fn system(config: HostConfig) -> Result<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new(config.command_timeout())?);
        let engine = Box::new(DockerCli::new(&config, Arc::clone(&runner)));
        let store = Store::open(config.state_file.clone())?;
        Ok(Self::new(config, runner, engine, store))
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.config, self.runner.as_ref(), self.engine.as_ref())
    }

    fn driver(&self) -> MutationDriver<'_> {
        MutationDriver::new(&self.config, self.runner.as_ref())
    }

    /// Bonds are always created with the default MTU.
    fn check_bond_mtu(&self, mtu: u32) -> Result<()> {
        if mtu != self.config.default_mtu {
            return Err(Error::ValidationFailed(format!(
                "Bond connections use the default mtu ({}).",
                self.config.default_mtu
            )));
        }
        Ok(())
    }

    fn view_by_name(&self, inv: &Inventory, name: &str) -> Option<ConnectionView> {
        let conn = inv.connection(inv.connection_by_name(name)?)?;
        Some(ConnectionView::new(inv, conn, self.config.default_mtu))
    }

    /// Run a full reconciliation pass.
    pub fn refresh_state(&self) -> Result<ReconcileReport> {
        self.store.transaction(|inv| self.reconciler().refresh_all(inv))
    }

    /// Refresh connections and list them.
    pub fn list_connections(&self) -> Result<Vec<ConnectionView>> {
        self.store.transaction(|inv| {
            self.reconciler().refresh_connections(inv)?;
            let inv: &Inventory = inv;
            Ok(inv
                .connections
                .values()
                .map(|c| ConnectionView::new(inv, c, self.config.default_mtu))
                .collect())
        })
    }

    /// Refresh devices and list them.
    pub fn list_devices(&self) -> Result<Vec<DeviceView>> {
        self.store.transaction(|inv| {
            self.reconciler().refresh_devices(inv)?;
            let inv: &Inventory = inv;
            Ok(inv
                .devices
                .values()
                .map(|d| DeviceView {
                    cname: inv.device_cname(&d.name).map(String::from),
                    managed: d.is_managed(),
                    device: d.clone(),
                })
                .collect())
        })
    }

    /// Resolve a numeric id or a unique connection name.
    pub fn resolve(&self, key: &str) -> Result<ConnectionId> {
        self.store.read(|inv| lookup(inv, key))
    }

    pub fn get_connection(&self, id: ConnectionId) -> Result<ConnectionView> {
        self.store.read(|inv| {
            let conn = find(inv, id)?;
            Ok(ConnectionView::new(inv, conn, self.config.default_mtu))
        })
    }

    /// Create an ethernet, team or bond connection.
    ///
    /// Returns the new record when the follow-up refresh picked it up.
    pub fn create_connection(&self, request: &ConnectionRequest) -> Result<Option<ConnectionView>> {
        self.store.transaction(|inv| {
            let name = validate_connection_name(&request.name)?;
            if inv.name_in_use(&name) {
                return Err(Error::DuplicateName(name));
            }
            let ipv4 = ipv4_settings(
                &request.method,
                &request.ipaddr,
                &request.gateway,
                &request.dns_servers,
                &request.search_domains,
            )?;
            let mtu = match request.mtu {
                Some(mtu) => validate_mtu(mtu, &self.config)?,
                None => self.config.default_mtu,
            };
            let driver = self.driver();

            match request.ctype.as_str() {
                "ethernet" => {
                    let candidates: Vec<String> =
                        request.device.iter().chain(&request.devices).take(1).cloned().collect();
                    let device = validate_devices(inv, &candidates, 1)?.remove(0);
                    driver.create_ethernet(&name, &device, &ipv4, mtu)?;
                }
                "team" => {
                    let profile = request.team_profile.as_deref().unwrap_or_default();
                    let runner = validate_team_profile(profile, &self.config)?;
                    let devices = validate_devices(inv, &request.devices, self.config.min_aggregate_members)?;
                    driver.create_team(&name, runner, &devices, &ipv4, mtu)?;
                }
                "bond" => {
                    let profile = request.bond_profile.as_deref().unwrap_or_default();
                    validate_bond_profile(profile, &self.config)?;
                    self.check_bond_mtu(mtu)?;
                    let devices = validate_devices(inv, &request.devices, self.config.min_aggregate_members)?;
                    driver.create_bond(&name, profile, &devices, &ipv4)?;
                }
                other => {
                    return Err(Error::ValidationFailed(format!(
                        "Unsupported connection type ({}). Supported ones include: ({}).",
                        other,
                        CREATABLE_TYPES.join(", ")
                    )))
                }
            }
            info!("Created {} connection {}", request.ctype, name);

            self.reconciler().refresh_all(inv)?;
            Ok(self.view_by_name(inv, &name))
        })
    }

    /// Re-address a connection by deleting and recreating it.
    ///
    /// Bound devices and the team/bond profile carry over.
    pub fn update_connection(&self, id: ConnectionId, update: &ConnectionUpdate) -> Result<Option<ConnectionView>> {
        let mtu = validate_mtu(update.mtu.unwrap_or(self.config.default_mtu), &self.config)?;
        self.store.transaction(|inv| {
            let conn = find(inv, id)?.clone();
            let name = conn.name().unwrap_or_default().to_string();
            let ipv4 = ipv4_settings(
                &update.method,
                &update.ipaddr,
                &update.gateway,
                &update.dns_servers,
                &update.search_domains,
            )?;
            let driver = self.driver();

            match &conn.kind {
                Some(ConnectionKind::Ethernet(_)) => {
                    let device = inv
                        .devices
                        .values()
                        .find(|d| d.connection == Some(id))
                        .map(|d| d.name.clone())
                        .ok_or_else(|| {
                            Error::ValidationFailed(format!("Connection ({}) has no device.", name))
                        })?;
                    self.remove_connection(inv, &conn)?;
                    driver.create_ethernet(&name, &device, &ipv4, mtu)?;
                }
                Some(ConnectionKind::Team(_)) => {
                    let profile = conn.team_profile().unwrap_or_default();
                    let runner = validate_team_profile(&profile, &self.config)?.to_string();
                    let devices = member_devices(inv, id);
                    validate_devices(inv, &devices, self.config.min_aggregate_members)?;
                    self.remove_connection(inv, &conn)?;
                    driver.create_team(&name, &runner, &devices, &ipv4, mtu)?;
                }
                Some(ConnectionKind::Bond(_)) => {
                    let profile = conn.bond_profile().unwrap_or_default();
                    validate_bond_profile(&profile, &self.config)?;
                    self.check_bond_mtu(mtu)?;
                    let devices = member_devices(inv, id);
                    validate_devices(inv, &devices, self.config.min_aggregate_members)?;
                    self.remove_connection(inv, &conn)?;
                    driver.create_bond(&name, &profile, &devices, &ipv4)?;
                }
                Some(ConnectionKind::Bridge(bridge)) => return Err(container_network(&name, bridge.docker_name.as_deref())),
                None => {
                    return Err(Error::ValidationFailed(format!(
                        "Connection ({}) is of a type that cannot be edited.",
                        name
                    )))
                }
            }
            info!("Recreated connection {}", name);

            self.reconciler().refresh_all(inv)?;
            Ok(self.view_by_name(inv, &name))
        })
    }

    /// Delete a connection and its members.
    pub fn delete_connection(&self, id: ConnectionId) -> Result<()> {
        self.store.transaction(|inv| {
            let conn = find(inv, id)?.clone();
            let name = conn.name().unwrap_or_default();
            if let Some(ConnectionKind::Bridge(bridge)) = &conn.kind {
                return Err(container_network(name, bridge.docker_name.as_deref()));
            }
            if self.config.management_connection.as_deref() == Some(name) {
                return Err(Error::ValidationFailed(format!(
                    "This connection ({}) is designated for management and cannot be deleted. \
                     If you really need to delete it, change the management_connection setting \
                     and try again.",
                    name
                )));
            }
            self.remove_connection(inv, &conn)?;
            info!("Deleted connection {}", name);
            Ok(())
        })
    }

    /// Bring a connection up, down or reload it.
    ///
    /// Bringing up a team or bond activates its members in name order.
    pub fn toggle_connection(&self, id: ConnectionId, switch: Toggle) -> Result<ConnectionView> {
        self.store.transaction(|inv| {
            let inv: &Inventory = inv;
            let conn = find(inv, id)?;
            let driver = self.driver();
            let aggregate = conn.kind.as_ref().map(ConnectionKind::is_aggregate).unwrap_or(false);
            if switch == Toggle::Up && aggregate {
                for member in inv.slaves_of(id) {
                    debug!("Bringing up member {:?} ({})", member.name(), member.uuid);
                    driver.toggle(&member.uuid, switch)?;
                }
            } else {
                driver.toggle(&conn.uuid, switch)?;
            }
            Ok(ConnectionView::new(inv, conn, self.config.default_mtu))
        })
    }

    /// Delete members then the connection itself from NetworkManager and the
    /// inventory. Connections NetworkManager no longer knows are only dropped
    /// from the inventory.
    fn remove_connection(&self, inv: &mut Inventory, conn: &NetworkConnection) -> Result<()> {
        let driver = self.driver();
        let members: Vec<(ConnectionId, String)> = inv
            .slaves_of(conn.id)
            .iter()
            .map(|m| (m.id, m.uuid.clone()))
            .collect();
        for (member, uuid) in members {
            driver.delete(&uuid)?;
            inv.remove_connection(member);
        }
        if !driver.delete(&conn.uuid)? {
            warn!("Connection {} was already gone from NetworkManager", conn.uuid);
        }
        inv.remove_connection(conn.id);
        Ok(())
    }
}

fn find(inv: &Inventory, id: ConnectionId) -> Result<&NetworkConnection> {
    inv.connection(id)
        .ok_or_else(|| Error::ConnectionNotFound(id.to_string()))
}

fn lookup(inv: &Inventory, key: &str) -> Result<ConnectionId> {
    if let Ok(raw) = key.parse::<u64>() {
        let id = ConnectionId(raw);
        if inv.connection(id).is_some() {
            return Ok(id);
        }
    }
    inv.connection_by_name(key)
        .ok_or_else(|| Error::ConnectionNotFound(key.to_string()))
}

fn container_network(name: &str, docker_name: Option<&str>) -> Error {
    Error::ValidationFailed(format!(
        "Connection ({}) backs container network ({}). Manage it through the container engine.",
        name,
        docker_name.unwrap_or(name)
    ))
}

/// Devices bound to the members of `master`, in member order.
fn member_devices(inv: &Inventory, master: ConnectionId) -> Vec<String> {
    inv.slaves_of(master)
        .iter()
        .filter_map(|member| {
            inv.devices
                .values()
                .find(|d| d.connection == Some(member.id))
                .map(|d| d.name.clone())
        })
        .collect()
}

fn validate_devices(inv: &Inventory, devices: &[String], min: usize) -> Result<Vec<String>> {
    if devices.len() < min {
        return Err(Error::ValidationFailed(format!(
            "A minimum of {} devices are required.",
            min
        )));
    }
    for device in devices {
        if !inv.devices.contains_key(device) {
            return Err(Error::UnknownDevice(device.clone()));
        }
    }
    Ok(devices.to_vec())
}

/// IPv4 settings for `method`. Addressing is ignored for `auto`.
fn ipv4_settings(
    method: &str,
    ipaddr: &Option<String>,
    gateway: &Option<String>,
    dns: &Option<String>,
    search: &Option<String>,
) -> Result<Ipv4Settings> {
    let method: Ipv4Method = method.parse()?;
    if method == Ipv4Method::Auto {
        return Ok(Ipv4Settings::default());
    }
    let nonempty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(String::from);

    let address = nonempty(ipaddr);
    if let Some(address) = &address {
        validate_ipv4_cidr(address)?;
    }
    let gateway = nonempty(gateway);
    if let Some(gateway) = &gateway {
        validate_ipv4(gateway)?;
    }
    let dns = nonempty(dns);
    if let Some(dns) = &dns {
        validate_dns_servers(dns)?;
    }
    Ok(Ipv4Settings {
        address,
        gateway,
        dns,
        search: nonempty(search),
    })
}
