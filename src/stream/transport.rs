use crate::config::SshConfig;
use crate::error::{Result, SsmTailError};
use crate::select::Target;
use crate::session::SessionHandle;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

/// Builds the process that follows a target's logs through an open session
///
/// The command must write remote log lines to its stdout.
pub trait Transport: Send + Sync {
    fn command(&self, session: &SessionHandle, target: &Target) -> Command;

    /// Start the transport with the worker's stdio wiring
    fn spawn(&self, session: &SessionHandle, target: &Target) -> Result<SpawnedTransport> {
        spawn_transport(self.command(session, target), &target.id)
    }
}

/// `ssh` proxied through the session broker's open command
#[derive(Debug, Clone)]
pub struct SshTransport {
    program: String,
    user: String,
    port: u16,
    identity_file: Option<PathBuf>,
    strict_host_key_checking: bool,
}

impl SshTransport {
    pub fn new(config: &SshConfig) -> Self {
        Self {
            program: config.program.clone(),
            user: config.user.clone(),
            port: config.port,
            identity_file: config.identity_file.clone(),
            strict_host_key_checking: config.strict_host_key_checking,
        }
    }

    /// Full ssh argument vector, remote tail command included
    pub fn args(&self, session: &SessionHandle, target: &Target) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            proxy_command(session),
            "-o".to_string(),
            format!(
                "StrictHostKeyChecking={}",
                if self.strict_host_key_checking { "yes" } else { "no" }
            ),
        ];

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        if let Some(ref identity) = self.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().into_owned());
        }

        args.push(format!("{}@{}", self.user, target.id));
        args.extend(tail_command(&target.log_paths));
        args
    }
}

impl Transport for SshTransport {
    fn command(&self, session: &SessionHandle, target: &Target) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args(session, target));
        command
    }
}

/// `ProxyCommand=` option running the session's open command.
///
/// ssh hands the value to `/bin/sh`, so every token is single-quoted, and
/// `%` is doubled to survive ssh's own token expansion.
pub fn proxy_command(session: &SessionHandle) -> String {
    let tokens: Vec<String> = std::iter::once(&session.open_command)
        .chain(session.open_args.iter())
        .map(|token| shell_quote(token).replace('%', "%%"))
        .collect();

    format!("ProxyCommand={}", tokens.join(" "))
}

/// Remote command following every path in one process
pub fn tail_command(log_paths: &[String]) -> Vec<String> {
    let mut command = vec!["tail".to_string()];
    for path in log_paths {
        command.push("-F".to_string());
        command.push(shell_quote(path));
    }
    command
}

/// Quote a token for POSIX sh
fn shell_quote(token: &str) -> String {
    format!("'{}'", token.replace('\'', r"'\''"))
}

/// A running transport whose stdout has been taken for reading
pub struct SpawnedTransport {
    pub child: Child,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub pid: Option<u32>,
}

/// Spawn a transport command.
///
/// stdin stays attached to the terminal so interactive prompts still work,
/// stdout is piped for the worker, stderr passes through unfiltered.
pub fn spawn_transport(mut command: Command, target_id: &str) -> Result<SpawnedTransport> {
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| {
        SsmTailError::Spawn(format!("Failed to spawn transport for '{}': {}", target_id, e))
    })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        SsmTailError::Spawn(format!("Transport for '{}' has no stdout pipe", target_id))
    })?;

    let pid = child.id();

    Ok(SpawnedTransport {
        child,
        stdout: Box::new(stdout),
        pid,
    })
}
