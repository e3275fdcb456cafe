use crate::error::{Result, SsmTailError};
use crate::logs::{FilterSpec, OutputSink, TargetColor, SEPARATOR};
use crate::select::Target;
use crate::session::{SessionBroker, SessionHandle};
use crate::stream::transport::Transport;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lifecycle of one target's remote tail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    SessionOpen,
    Streaming,
    Draining,
    Closed,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Created => "created",
            WorkerState::SessionOpen => "session-open",
            WorkerState::Streaming => "streaming",
            WorkerState::Draining => "draining",
            WorkerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Collaborators and settings every worker of one run shares
#[derive(Clone)]
pub struct WorkerContext {
    pub broker: Arc<dyn SessionBroker>,
    pub transport: Arc<dyn Transport>,
    pub sink: Arc<dyn OutputSink>,
    pub filter: Arc<FilterSpec>,
    pub cancel: CancellationToken,
    pub open_timeout: Duration,
    pub close_timeout: Duration,
}

/// How the read loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// Remote side closed its output
    Eof,
    Cancelled,
    /// Read failed; treated like cancellation
    Failed,
}

/// Owns one target end to end: session, transport process, output, teardown
pub struct StreamWorker {
    target: Target,
    color: TargetColor,
    label: String,
    ctx: WorkerContext,
    state: WorkerState,
}

impl StreamWorker {
    pub fn new(target: Target, color: TargetColor, ctx: WorkerContext) -> Self {
        let label = color.paint(&target.id);
        Self {
            target,
            color,
            label,
            ctx,
            state: WorkerState::Created,
        }
    }

    /// Drive the worker to `Closed`.
    ///
    /// Every failure is reported to the sink; none is returned. A session that
    /// was opened is closed exactly once on every path.
    pub async fn run(mut self) -> WorkerState {
        let session = match self.open_session().await {
            Ok(session) => session,
            Err(e) => {
                self.report(&e);
                self.transition(WorkerState::Closed);
                return self.state;
            }
        };
        self.transition(WorkerState::SessionOpen);

        if self.ctx.cancel.is_cancelled() {
            debug!("{}: cancelled before streaming started", self.target.id);
            self.transition(WorkerState::Draining);
        } else {
            self.stream(&session).await;
        }

        self.close_session(&session).await;
        self.transition(WorkerState::Closed);
        self.ctx
            .sink
            .line(&format!("terminated: {}", self.target.id));

        self.state
    }

    /// Open a session within `open_timeout`.
    ///
    /// The broker call runs as its own task so that a request which misses
    /// the deadline can still be reaped; see [`Self::reap_late_open`].
    async fn open_session(&self) -> Result<SessionHandle> {
        let broker = Arc::clone(&self.ctx.broker);
        let target_id = self.target.id.clone();
        let mut open = tokio::spawn(async move { broker.open(&target_id).await });

        match tokio::time::timeout(self.ctx.open_timeout, &mut open).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(SsmTailError::SessionOpen {
                target: self.target.id.clone(),
                reason: format!("open task failed: {}", e),
            }),
            Err(_) => {
                self.reap_late_open(open).await;
                Err(SsmTailError::Timeout(format!(
                    "opening session for {} took longer than {:?}",
                    self.target.id, self.ctx.open_timeout
                )))
            }
        }
    }

    /// Give an overdue open up to `close_timeout` to finish, then close the
    /// session it produced. A request still pending after that is aborted;
    /// the broker may keep a session nobody will close.
    async fn reap_late_open(&self, mut open: JoinHandle<Result<SessionHandle>>) {
        match tokio::time::timeout(self.ctx.close_timeout, &mut open).await {
            Ok(Ok(Ok(session))) => {
                info!(
                    "{}: session {} opened after the deadline, closing it",
                    self.target.id, session.session_id
                );
                self.close_session(&session).await;
            }
            Ok(_) => debug!("{}: overdue open produced no session", self.target.id),
            Err(_) => {
                open.abort();
                self.report(&SsmTailError::Timeout(format!(
                    "gave up on session open for {}; a session may remain open on the broker",
                    self.target.id
                )));
            }
        }
    }

    /// SessionOpen -> Streaming -> Draining, ending with the transport reaped
    async fn stream(&mut self, session: &SessionHandle) {
        let spawned = match self.ctx.transport.spawn(session, &self.target) {
            Ok(spawned) => spawned,
            Err(e) => {
                self.report(&e);
                self.transition(WorkerState::Draining);
                return;
            }
        };

        info!(
            "{}: following {} file(s) (pid {:?})",
            self.target.id,
            self.target.log_paths.len(),
            spawned.pid
        );
        self.transition(WorkerState::Streaming);

        let mut child = spawned.child;
        let end = self.pump(spawned.stdout).await;

        if end == StreamEnd::Eof {
            info!(
                "{}: remote stream ended, waiting for interrupt",
                self.target.id
            );
            self.ctx.cancel.cancelled().await;
        }

        self.transition(WorkerState::Draining);
        self.terminate(&mut child).await;
    }

    /// Read, filter and print lines until EOF, cancellation or a read error
    async fn pump<R: AsyncRead + Unpin>(&self, stdout: R) -> StreamEnd {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        let mut remaining = 0;

        loop {
            buf.clear();

            let read = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => return StreamEnd::Cancelled,
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => return StreamEnd::Eof,
                Ok(_) => remaining = self.emit(&decode_line(&buf), remaining),
                Err(e) => {
                    self.report(&SsmTailError::StreamRead(format!(
                        "{}: {}",
                        self.target.id, e
                    )));
                    return StreamEnd::Failed;
                }
            }
        }
    }

    /// Print one line if the filter keeps it; returns the new context counter
    fn emit(&self, line: &str, remaining: usize) -> usize {
        let verdict = self.ctx.filter.apply(line, remaining, self.color);

        if let Some(text) = verdict.line {
            self.ctx.sink.line(&format!("[{}] {}", self.label, text));
        }
        if verdict.separator {
            self.ctx.sink.line(&self.color.paint(SEPARATOR));
        }

        verdict.remaining
    }

    /// Kill the transport if it is still running, then reap it
    async fn terminate(&self, child: &mut Child) {
        match child.try_wait() {
            Ok(Some(status)) => debug!("{}: transport already exited ({})", self.target.id, status),
            Ok(None) => {
                if let Err(e) = child.start_kill() {
                    self.report(&SsmTailError::Terminate(format!(
                        "failed to kill transport for {}: {}",
                        self.target.id, e
                    )));
                }
            }
            Err(e) => self.report(&SsmTailError::Terminate(format!(
                "failed to poll transport for {}: {}",
                self.target.id, e
            ))),
        }

        if let Err(e) = child.wait().await {
            self.report(&SsmTailError::Terminate(format!(
                "failed to wait for transport of {}: {}",
                self.target.id, e
            )));
        }
    }

    async fn close_session(&self, session: &SessionHandle) {
        let close = self.ctx.broker.close(&session.session_id);

        match tokio::time::timeout(self.ctx.close_timeout, close).await {
            Ok(Ok(())) => debug!("{}: closed session {}", self.target.id, session.session_id),
            Ok(Err(e)) => self.report(&e),
            Err(_) => self.report(&SsmTailError::Timeout(format!(
                "closing session {} took longer than {:?}",
                session.session_id, self.ctx.close_timeout
            ))),
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!("{}: {} -> {}", self.target.id, self.state, next);
        self.state = next;
    }

    /// Report a failure on the operator's error channel; trace it for -v
    fn report(&self, err: &SsmTailError) {
        debug!("{}: {} (state {})", self.target.id, err, self.state);
        self.ctx.sink.error(&format!("[{}] {}", self.target.id, err));
    }
}

/// Raw line bytes to text: newline and CR dropped, invalid UTF-8 replaced
fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
