// HostSync - Command Execution
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Every interaction with the host goes through a [`CommandRunner`], so the
//! parsers and drivers above it can be exercised against scripted output.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::models::{Error, Result};

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external program.
pub trait CommandRunner: Send + Sync {
    /// Run `argv` (program first), optionally feeding `stdin`.
    ///
    /// With `throw`, a non-zero exit is returned as [`Error::CommandFailed`]
    /// carrying the exit code; otherwise the output is returned as is.
    fn run(&self, argv: &[&str], stdin: Option<&str>, throw: bool) -> Result<CommandOutput>;
}

/// Runs commands on the host with a bounded timeout.
///
/// Processes are driven by a private current-thread tokio runtime, so callers
/// stay synchronous. A child that outlives the timeout is killed.
pub struct SystemRunner {
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime, timeout })
    }

    async fn execute(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<std::process::Output> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::CommandSpawn {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
        }

        Ok(child.wait_with_output().await?)
    }
}

fn split_lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw).lines().map(str::to_string).collect()
}

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[&str], stdin: Option<&str>, throw: bool) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Internal("empty command line".to_string()))?;

        debug!("Running: {}", argv.join(" "));

        let output = self.runtime.block_on(async {
            match tokio::time::timeout(self.timeout, self.execute(program, args, stdin)).await {
                Ok(result) => result,
                Err(_) => Err(Error::CommandTimeout {
                    program: program.to_string(),
                    secs: self.timeout.as_secs(),
                }),
            }
        })?;

        let result = CommandOutput {
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
            code: output.status.code(),
        };

        if throw && !result.success() {
            debug!("{} exited with {:?}", program, result.code);
            return Err(Error::command_failed(
                *program,
                result.code,
                result.stderr.join("\n"),
            ));
        }

        Ok(result)
    }
}
