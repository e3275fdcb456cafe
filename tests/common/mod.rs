// Shared fixtures for stream integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ssmtail::error::{Result, SsmTailError};
use ssmtail::select::Target;
use ssmtail::session::{SessionBroker, SessionHandle};
use ssmtail::stream::{spawn_transport, SpawnedTransport, Transport};
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::Command;

/// Script name that spawns a long-running process whose stdout fails to read
pub const FAILING_READ: &str = "failing-read";

/// Line delivered by [`FailingReader`] before its error
pub const LINE_BEFORE_FAILURE: &str = "before failure";

/// Broker that records every open and close
#[derive(Default)]
pub struct MockBroker {
    open_delays: HashMap<String, Duration>,
    failing: Vec<String>,
    failing_close: bool,
    opened: Mutex<Vec<String>>,
    closed: Mutex<Vec<String>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay `open` for one target
    pub fn with_open_delay(mut self, target: &str, delay: Duration) -> Self {
        self.open_delays.insert(target.to_string(), delay);
        self
    }

    /// Make `open` fail for one target
    pub fn with_failing_open(mut self, target: &str) -> Self {
        self.failing.push(target.to_string());
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.failing_close = true;
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }

    /// Close calls made for one session id
    pub fn close_count(&self, session_id: &str) -> usize {
        self.closed().iter().filter(|s| s.as_str() == session_id).count()
    }
}

pub fn session_id_for(target: &str) -> String {
    format!("sess-{}", target)
}

#[async_trait]
impl SessionBroker for MockBroker {
    async fn open(&self, target_id: &str) -> Result<SessionHandle> {
        if let Some(delay) = self.open_delays.get(target_id) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.iter().any(|t| t == target_id) {
            return Err(SsmTailError::SessionOpen {
                target: target_id.to_string(),
                reason: "TargetNotConnected".to_string(),
            });
        }

        let session_id = session_id_for(target_id);
        self.opened.lock().unwrap().push(session_id.clone());
        Ok(SessionHandle::new(session_id, "true", vec![]))
    }

    async fn close(&self, session_id: &str) -> Result<()> {
        self.closed.lock().unwrap().push(session_id.to_string());

        if self.failing_close {
            return Err(SsmTailError::SessionClose {
                session: session_id.to_string(),
                reason: "InvalidSessionId".to_string(),
            });
        }
        Ok(())
    }
}

/// Runs a shell script per target instead of ssh
pub struct ScriptTransport {
    scripts: HashMap<String, String>,
    default_script: String,
    spawned: Mutex<Vec<String>>,
    built: AtomicUsize,
}

impl ScriptTransport {
    /// Every target runs `script`
    pub fn new(script: &str) -> Self {
        Self {
            scripts: HashMap::new(),
            default_script: script.to_string(),
            spawned: Mutex::new(Vec::new()),
            built: AtomicUsize::new(0),
        }
    }

    pub fn with_script(mut self, target: &str, script: &str) -> Self {
        self.scripts.insert(target.to_string(), script.to_string());
        self
    }

    /// Targets a command was built for, in build order
    pub fn spawned(&self) -> Vec<String> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptTransport {
    fn command(&self, _session: &SessionHandle, target: &Target) -> Command {
        self.built.fetch_add(1, Ordering::SeqCst);
        self.spawned.lock().unwrap().push(target.id.clone());

        let script = match self.script_for(&target.id) {
            "missing-program" => return Command::new("/nonexistent/ssmtail-transport"),
            FAILING_READ => "exec sleep 30",
            script => script,
        };

        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(script);
        command
    }

    fn spawn(&self, session: &SessionHandle, target: &Target) -> Result<SpawnedTransport> {
        let mut spawned = spawn_transport(self.command(session, target), &target.id)?;

        if self.script_for(&target.id) == FAILING_READ {
            spawned.stdout = Box::new(FailingReader::default());
        }
        Ok(spawned)
    }
}

impl ScriptTransport {
    fn script_for(&self, target_id: &str) -> &str {
        self.scripts
            .get(target_id)
            .unwrap_or(&self.default_script)
    }
}

/// Yields one line, then fails every read
#[derive(Default)]
pub struct FailingReader {
    sent: bool,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.sent {
            self.sent = true;
            buf.put_slice(format!("{}\n", LINE_BEFORE_FAILURE).as_bytes());
            return Poll::Ready(Ok(()));
        }

        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}

pub fn target(id: &str) -> Target {
    Target::new(id, vec!["/var/log/app.log".to_string()])
}

/// Poll `check` until it holds or two seconds pass
pub async fn wait_until<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
