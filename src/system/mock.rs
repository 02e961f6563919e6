// HostSync - Test Doubles
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Scripted runner and container engine for tests.
//!
//! Command lines are keyed with the program reduced to its file name, so
//! `/usr/bin/nmcli c show u-1` is matched and recorded as `nmcli c show u-1`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use super::command::{CommandOutput, CommandRunner};
use super::docker::{ContainerEngine, NetworkType};
use crate::models::{Error, Result};

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Exit(i32),
}

/// Replays canned output and records every call.
#[derive(Debug, Default)]
pub struct MockRunner {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `cmdline` with `stdout` and exit code 0.
    pub fn respond(&self, cmdline: &str, stdout: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(cmdline.to_string(), Reply::Output(stdout.to_string()));
    }

    /// Answer `cmdline` with a non-zero exit.
    pub fn fail(&self, cmdline: &str, code: i32) {
        self.replies
            .lock()
            .unwrap()
            .insert(cmdline.to_string(), Reply::Exit(code));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls starting with `prefix`.
    pub fn calls_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

fn cmdline(argv: &[&str]) -> String {
    let mut parts: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
    if let Some(program) = parts.first_mut() {
        if let Some(name) = Path::new(program.as_str()).file_name() {
            *program = name.to_string_lossy().into_owned();
        }
    }
    parts.join(" ")
}

impl CommandRunner for MockRunner {
    fn run(&self, argv: &[&str], _stdin: Option<&str>, throw: bool) -> Result<CommandOutput> {
        let line = cmdline(argv);
        self.calls.lock().unwrap().push(line.clone());

        let reply = self.replies.lock().unwrap().get(&line).cloned();
        let output = match reply {
            Some(Reply::Output(stdout)) => CommandOutput {
                stdout: stdout.lines().map(str::to_string).collect(),
                stderr: Vec::new(),
                code: Some(0),
            },
            Some(Reply::Exit(code)) => CommandOutput {
                stdout: Vec::new(),
                stderr: vec![format!("scripted failure of {}", line)],
                code: Some(code),
            },
            None => CommandOutput {
                code: Some(0),
                ..CommandOutput::default()
            },
        };

        if throw && !output.success() {
            return Err(Error::command_failed(argv[0], output.code, output.stderr.join("\n")));
        }
        Ok(output)
    }
}

/// In-memory container engine.
#[derive(Debug, Default)]
pub struct MockEngine {
    pub running: bool,
    /// Network name to inspect document.
    pub networks: BTreeMap<String, serde_json::Value>,
    /// Network id prefix to name.
    pub ids: BTreeMap<String, String>,
    pub execs: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn running() -> Self {
        Self {
            running: true,
            ..Self::default()
        }
    }

    pub fn with_network(mut self, name: &str, id: &str, inspect: serde_json::Value) -> Self {
        self.networks.insert(name.to_string(), inspect);
        self.ids.insert(id.to_string(), name.to_string());
        self
    }

    pub fn execs(&self) -> Vec<String> {
        self.execs.lock().unwrap().clone()
    }
}

impl ContainerEngine for MockEngine {
    fn service_running(&self) -> Result<bool> {
        Ok(self.running)
    }

    fn list_networks(&self, filter_id: Option<&str>, _filter_type: Option<NetworkType>) -> Result<Vec<String>> {
        Ok(match filter_id {
            Some(id) => self
                .ids
                .iter()
                .filter(|(key, _)| key.starts_with(id))
                .map(|(_, name)| name.clone())
                .collect(),
            None => self.networks.keys().cloned().collect(),
        })
    }

    fn inspect_network(&self, name: &str) -> Result<serde_json::Value> {
        self.networks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::command_failed("docker", Some(1), format!("No such network: {}", name)))
    }

    fn exec(&self, args: &[&str]) -> Result<Vec<String>> {
        self.execs.lock().unwrap().push(args.join(" "));
        Ok(Vec::new())
    }
}
