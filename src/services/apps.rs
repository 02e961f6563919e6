// HostSync - Application Management
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Containerized application lifecycle.
//!
//! Requests flip a `pending_*` marker and hand the work to a
//! [`TaskExecutor`]; the executor reports back through
//! [`AppManager::complete`]. While any application is pending, further
//! state-changing requests are rejected.
//!
//! Per-application behavior is looked up in a [`HandlerRegistry`], falling
//! back to [`GenericHandler`].

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{App, AppState, AppStatus, Error, Result};
use crate::storage::Store;
use crate::system::ContainerEngine;

/// Lifecycle operations every application supports.
pub trait AppHandler: Send + Sync {
    fn start(&self, app: &App, engine: &dyn ContainerEngine) -> Result<()>;
    fn stop(&self, app: &App, engine: &dyn ContainerEngine) -> Result<()>;
    fn install(&self, app: &App, engine: &dyn ContainerEngine) -> Result<()>;
    fn uninstall(&self, app: &App, engine: &dyn ContainerEngine) -> Result<()>;
}

/// Drives an application's containers with plain engine commands.
#[derive(Debug, Default)]
pub struct GenericHandler;

fn ensure_running(engine: &dyn ContainerEngine) -> Result<()> {
    if engine.service_running()? {
        Ok(())
    } else {
        Err(Error::ServiceNotRunning("container engine".to_string()))
    }
}

impl AppHandler for GenericHandler {
    fn start(&self, app: &App, engine: &dyn ContainerEngine) -> Result<()> {
        ensure_running(engine)?;
        for container in &app.containers {
            engine.exec(&["start", container.name.as_str()])?;
        }
        Ok(())
    }

    /// Containers stop in reverse start order.
    fn stop(&self, app: &App, engine: &dyn ContainerEngine) -> Result<()> {
        ensure_running(engine)?;
        for container in app.containers.iter().rev() {
            engine.exec(&["stop", container.name.as_str()])?;
        }
        Ok(())
    }

    fn install(&self, app: &App, engine: &dyn ContainerEngine) -> Result<()> {
        ensure_running(engine)?;
        for container in &app.containers {
            let mut args: Vec<&str> = vec!["run", "-d", "--name", container.name.as_str()];
            for network in &app.networks {
                args.push("--network");
                args.push(network.as_str());
            }
            args.extend(container.run_args.iter().map(String::as_str));
            args.push(container.image.as_str());
            engine.exec(&args)?;
        }
        Ok(())
    }

    fn uninstall(&self, app: &App, engine: &dyn ContainerEngine) -> Result<()> {
        ensure_running(engine)?;
        for container in app.containers.iter().rev() {
            engine.exec(&["rm", "-f", container.name.as_str()])?;
        }
        Ok(())
    }
}

/// Maps application ids to their handlers.
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn AppHandler>>,
    fallback: Box<dyn AppHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Box::new(GenericHandler),
        }
    }

    pub fn register(&mut self, app: impl Into<String>, handler: Box<dyn AppHandler>) {
        self.handlers.insert(app.into(), handler);
    }

    /// Handler for `app`, or the generic one.
    pub fn handler(&self, app: &str) -> &dyn AppHandler {
        match self.handlers.get(app) {
            Some(handler) => handler.as_ref(),
            None => self.fallback.as_ref(),
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// State-changing application request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppOperation {
    Start,
    Stop,
    Install,
    Uninstall,
}

impl fmt::Display for AppOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        })
    }
}

/// Queued application operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTask {
    pub id: Uuid,
    pub app: String,
    pub operation: AppOperation,
}

/// Runs application operations asynchronously.
pub trait TaskExecutor: Send + Sync {
    /// Queue an operation and return its task id.
    fn enqueue(&self, app: &str, operation: AppOperation) -> Result<Uuid>;
}

/// In-process FIFO executor, drained explicitly.
#[derive(Debug, Default)]
pub struct QueueExecutor {
    queue: Mutex<VecDeque<AppTask>>,
}

impl QueueExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn pop(&self) -> Option<AppTask> {
        match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every queued task through `manager`. Returns the number run.
    pub fn drain(&self, manager: &AppManager<'_>) -> usize {
        let mut count = 0;
        while let Some(task) = self.pop() {
            if let Err(e) = manager.execute(&task) {
                error!("Task {} ({} {}) failed: {}", task.id, task.operation, task.app, e);
            }
            count += 1;
        }
        count
    }
}

impl TaskExecutor for QueueExecutor {
    fn enqueue(&self, app: &str, operation: AppOperation) -> Result<Uuid> {
        let task = AppTask {
            id: Uuid::new_v4(),
            app: app.to_string(),
            operation,
        };
        let id = task.id;
        match self.queue.lock() {
            Ok(mut queue) => queue.push_back(task),
            Err(poisoned) => poisoned.into_inner().push_back(task),
        }
        Ok(id)
    }
}

/// Validates application requests and applies their outcome.
pub struct AppManager<'a> {
    store: &'a Store,
    registry: &'a HandlerRegistry,
    engine: &'a dyn ContainerEngine,
    executor: &'a dyn TaskExecutor,
}

impl<'a> AppManager<'a> {
    pub fn new(
        store: &'a Store,
        registry: &'a HandlerRegistry,
        engine: &'a dyn ContainerEngine,
        executor: &'a dyn TaskExecutor,
    ) -> Self {
        Self {
            store,
            registry,
            engine,
            executor,
        }
    }

    /// Add or replace an application definition.
    pub fn add_app(&self, app: App) -> Result<()> {
        self.store.transaction(|inv| {
            inv.apps.insert(app.name.clone(), app);
            Ok(())
        })
    }

    /// Mark `name` pending for `operation` and queue it.
    pub fn request(&self, name: &str, operation: AppOperation) -> Result<Uuid> {
        self.store.transaction(|inv| {
            if let Some(busy) = inv.pending_app() {
                return Err(Error::PendingTransition(busy.to_string()));
            }
            let app = inv
                .apps
                .get_mut(name)
                .ok_or_else(|| Error::AppNotFound(name.to_string()))?;
            mark_pending(app, operation)
        })?;

        match self.executor.enqueue(name, operation) {
            Ok(task) => {
                info!("Queued {} of {} as task {}", operation, name, task);
                Ok(task)
            }
            Err(e) => {
                warn!("Could not queue {} of {}: {}", operation, name, e);
                self.complete(name, operation, false)?;
                Err(e)
            }
        }
    }

    /// Run one queued task and record its outcome.
    pub fn execute(&self, task: &AppTask) -> Result<()> {
        let app = self
            .store
            .read(|inv| inv.apps.get(&task.app).cloned())
            .ok_or_else(|| Error::AppNotFound(task.app.clone()))?;
        let handler = self.registry.handler(&app.name);
        let result = match task.operation {
            AppOperation::Start => handler.start(&app, self.engine),
            AppOperation::Stop => handler.stop(&app, self.engine),
            AppOperation::Install => handler.install(&app, self.engine),
            AppOperation::Uninstall => handler.uninstall(&app, self.engine),
        };
        self.complete(&task.app, task.operation, result.is_ok())?;
        result
    }

    /// Status callback: settle the pending marker of `name`.
    ///
    /// A successful install links the application's networks; a successful
    /// uninstall unlinks those no other installed application uses.
    pub fn complete(&self, name: &str, operation: AppOperation, success: bool) -> Result<()> {
        self.store.transaction(|inv| {
            let app = inv
                .apps
                .get_mut(name)
                .ok_or_else(|| Error::AppNotFound(name.to_string()))?;
            settle(app, operation, success);
            info!(
                "{} of {} {}: now {}/{}",
                operation,
                name,
                if success { "succeeded" } else { "failed" },
                app.state.as_str(),
                app.status.as_str()
            );
            let networks = app.networks.clone();

            match (operation, success) {
                (AppOperation::Install, true) => inv.container_links.extend(networks),
                (AppOperation::Uninstall, true) => {
                    for network in networks {
                        let shared = inv.apps.values().any(|other| {
                            other.name != name
                                && other.state == AppState::Installed
                                && other.networks.contains(&network)
                        });
                        if !shared {
                            inv.container_links.remove(&network);
                        }
                    }
                }
                _ => {}
            }
            Ok(())
        })
    }
}

fn invalid(app: &App, reason: &str) -> Error {
    Error::InvalidAppState {
        app: app.name.clone(),
        state: app.state.as_str().to_string(),
        reason: reason.to_string(),
    }
}

fn mark_pending(app: &mut App, operation: AppOperation) -> Result<()> {
    match operation {
        AppOperation::Install => match app.state {
            AppState::Available | AppState::InstallFailed => app.state = AppState::PendingInstall,
            _ => return Err(invalid(app, "already installed")),
        },
        AppOperation::Uninstall => match app.state {
            AppState::Installed | AppState::UninstallFailed => app.state = AppState::PendingUninstall,
            _ => return Err(invalid(app, "not installed")),
        },
        AppOperation::Start => {
            if app.state != AppState::Installed {
                return Err(invalid(app, "not installed"));
            }
            if app.is_running() {
                return Err(invalid(app, "already running"));
            }
            app.status = AppStatus::PendingStart;
        }
        AppOperation::Stop => {
            if app.state != AppState::Installed {
                return Err(invalid(app, "not installed"));
            }
            if !app.is_running() {
                return Err(invalid(app, "not running"));
            }
            app.status = AppStatus::PendingStop;
        }
    }
    Ok(())
}

fn settle(app: &mut App, operation: AppOperation, success: bool) {
    match (operation, success) {
        (AppOperation::Install, true) => {
            app.state = AppState::Installed;
            app.status = AppStatus::Started;
        }
        (AppOperation::Install, false) => {
            app.state = AppState::InstallFailed;
            app.status = AppStatus::Stopped;
        }
        (AppOperation::Uninstall, true) => {
            app.state = AppState::Available;
            app.status = AppStatus::Stopped;
        }
        (AppOperation::Uninstall, false) => app.state = AppState::UninstallFailed,
        (AppOperation::Start, true) => app.status = AppStatus::Started,
        (AppOperation::Start, false) => app.status = AppStatus::Failed,
        (AppOperation::Stop, true) => app.status = AppStatus::Stopped,
        (AppOperation::Stop, false) => app.status = AppStatus::Started,
    }
}
