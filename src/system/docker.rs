// HostSync - Container Engine
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Container engine access through the `docker` CLI.

use std::sync::Arc;

use tracing::debug;

use super::command::CommandRunner;
use crate::models::{HostConfig, Result};

/// Network type filter for [`ContainerEngine::list_networks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    /// User-defined networks, the ones backing `br-<id>` bridges.
    Custom,
}

impl NetworkType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Custom => "custom",
        }
    }
}

/// Operations HostSync needs from the container engine.
pub trait ContainerEngine: Send + Sync {
    /// Whether the engine service is active.
    fn service_running(&self) -> Result<bool>;

    /// Names of networks matching the optional filters.
    fn list_networks(&self, filter_id: Option<&str>, filter_type: Option<NetworkType>) -> Result<Vec<String>>;

    /// Full `docker network inspect` document of one network.
    fn inspect_network(&self, name: &str) -> Result<serde_json::Value>;

    /// Run a container engine subcommand, e.g. `["start", "plex"]`.
    fn exec(&self, args: &[&str]) -> Result<Vec<String>>;
}

/// [`ContainerEngine`] backed by the docker CLI.
pub struct DockerCli {
    runner: Arc<dyn CommandRunner>,
    docker: String,
    systemctl: String,
    service: String,
}

impl DockerCli {
    pub fn new(config: &HostConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            docker: config.docker_path.to_string_lossy().into_owned(),
            systemctl: config.systemctl_path.to_string_lossy().into_owned(),
            service: config.container_service.clone(),
        }
    }
}

impl ContainerEngine for DockerCli {
    fn service_running(&self) -> Result<bool> {
        let out = self.runner.run(
            &[self.systemctl.as_str(), "is-active", "--quiet", self.service.as_str()],
            None,
            false,
        )?;
        debug!("{} active: {}", self.service, out.success());
        Ok(out.success())
    }

    fn list_networks(&self, filter_id: Option<&str>, filter_type: Option<NetworkType>) -> Result<Vec<String>> {
        let id_filter = filter_id.map(|id| format!("id={}", id));
        let type_filter = filter_type.map(|t| format!("type={}", t.as_str()));

        let mut argv: Vec<&str> = vec![self.docker.as_str(), "network", "ls", "--format", "{{.Name}}"];
        for filter in [&id_filter, &type_filter].into_iter().flatten() {
            argv.push("--filter");
            argv.push(filter.as_str());
        }

        let out = self.runner.run(&argv, None, true)?;
        Ok(out
            .stdout
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    fn inspect_network(&self, name: &str) -> Result<serde_json::Value> {
        let out = self.runner.run(
            &[self.docker.as_str(), "network", "inspect", name, "--format", "{{json .}}"],
            None,
            true,
        )?;
        Ok(serde_json::from_str(&out.stdout.join("\n"))?)
    }

    fn exec(&self, args: &[&str]) -> Result<Vec<String>> {
        let mut argv: Vec<&str> = Vec::with_capacity(args.len() + 1);
        argv.push(self.docker.as_str());
        argv.extend_from_slice(args);
        Ok(self.runner.run(&argv, None, true)?.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::mock::MockRunner;

    fn engine(runner: &Arc<MockRunner>) -> DockerCli {
        DockerCli::new(&HostConfig::default(), runner.clone())
    }

    #[test]
    fn test_service_running_tolerates_failure() {
        let runner = Arc::new(MockRunner::new());
        runner.fail("systemctl is-active --quiet docker", 3);
        assert!(!engine(&runner).service_running().expect("service check"));

        let runner = Arc::new(MockRunner::new());
        assert!(engine(&runner).service_running().expect("service check"));
    }

    #[test]
    fn test_list_networks_filters() {
        let runner = Arc::new(MockRunner::new());
        runner.respond(
            "docker network ls --format {{.Name}} --filter id=3f2a --filter type=custom",
            "rocknet\n\n",
        );
        let names = engine(&runner)
            .list_networks(Some("3f2a"), Some(NetworkType::Custom))
            .expect("list");
        assert_eq!(names, vec!["rocknet"]);
    }

    #[test]
    fn test_inspect_parses_json() {
        let runner = Arc::new(MockRunner::new());
        runner.respond(
            "docker network inspect bridge --format {{json .}}",
            r#"{"Name":"bridge","Internal":false}"#,
        );
        let doc = engine(&runner).inspect_network("bridge").expect("inspect");
        assert_eq!(doc["Name"], "bridge");
    }
}
