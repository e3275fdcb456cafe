use crate::logs::{color_for, FilterSpec, OutputSink};
use crate::select::Target;
use crate::session::SessionBroker;
use crate::stream::transport::Transport;
use crate::stream::worker::{StreamWorker, WorkerContext, WorkerState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Printed once every worker has closed
pub const FINISHED_MARKER: &str = "finished gracefully";

/// Printed when the first interrupt arrives
pub const INTERRUPT_ACK: &str = "interrupt, terminating sessions";

const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Workers spawned, one per target
    pub workers: usize,
    /// Workers that reached `Closed`
    pub closed: usize,
}

/// Fans out one worker per target and waits for all of them
pub struct Coordinator {
    broker: Arc<dyn SessionBroker>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn OutputSink>,
    open_timeout: Duration,
    close_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        broker: Arc<dyn SessionBroker>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            broker,
            transport,
            sink,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Deadlines applied to every broker open and close
    pub fn with_timeouts(mut self, open_timeout: Duration, close_timeout: Duration) -> Self {
        self.open_timeout = open_timeout;
        self.close_timeout = close_timeout;
        self
    }

    /// Stream every target until the operator interrupts.
    ///
    /// Installs the interrupt listener for the duration of the run.
    pub async fn run_until_interrupted(
        &self,
        targets: Vec<Target>,
        filter: FilterSpec,
    ) -> RunSummary {
        let cancel = CancellationToken::new();
        let listener = spawn_interrupt_listener(cancel.clone(), Arc::clone(&self.sink));

        let summary = self.run(targets, filter, cancel).await;

        listener.abort();
        summary
    }

    /// Stream every target until `cancel` fires and all workers have closed.
    ///
    /// Target `i` gets color `i`. Worker failures are reported by the workers
    /// themselves; this only waits for completion and never stops early.
    pub async fn run(
        &self,
        targets: Vec<Target>,
        filter: FilterSpec,
        cancel: CancellationToken,
    ) -> RunSummary {
        let ctx = WorkerContext {
            broker: Arc::clone(&self.broker),
            transport: Arc::clone(&self.transport),
            sink: Arc::clone(&self.sink),
            filter: Arc::new(filter),
            cancel,
            open_timeout: self.open_timeout,
            close_timeout: self.close_timeout,
        };

        let mut workers = JoinSet::new();
        for (index, target) in targets.into_iter().enumerate() {
            debug!("Spawning worker {} for {}", index, target.id);
            let worker = StreamWorker::new(target, color_for(index), ctx.clone());
            workers.spawn(worker.run());
        }

        let mut summary = RunSummary {
            workers: workers.len(),
            closed: 0,
        };
        info!("Streaming from {} target(s)", summary.workers);

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(WorkerState::Closed) => summary.closed += 1,
                Ok(state) => warn!("Worker finished in unexpected state {}", state),
                Err(e) => error!("Worker task failed: {}", e),
            }
        }

        self.sink.line(FINISHED_MARKER);
        summary
    }
}

/// Fire `cancel` on the first interrupt; later interrupts are swallowed.
///
/// The handler stays installed until the returned task is aborted, so a
/// repeated Ctrl-C during teardown cannot kill the process before sessions
/// are closed.
pub fn spawn_interrupt_listener(
    cancel: CancellationToken,
    sink: Arc<dyn OutputSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for interrupt: {}", e);
                return;
            }

            on_interrupt(&cancel, sink.as_ref());
        }
    })
}

/// Handle one interrupt: the first fires `cancel` and acknowledges it,
/// later ones are ignored. Returns whether this call fired the cancellation.
pub fn on_interrupt(cancel: &CancellationToken, sink: &dyn OutputSink) -> bool {
    if cancel.is_cancelled() {
        debug!("Interrupt ignored, shutdown already in progress");
        return false;
    }

    sink.line(INTERRUPT_ACK);
    cancel.cancel();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::MemorySink;

    #[test]
    fn test_only_first_interrupt_cancels() {
        let cancel = CancellationToken::new();
        let sink = MemorySink::new();

        assert!(on_interrupt(&cancel, &sink));
        assert!(cancel.is_cancelled());
        assert!(!on_interrupt(&cancel, &sink));
        assert!(!on_interrupt(&cancel, &sink));

        assert_eq!(sink.lines(), vec![INTERRUPT_ACK]);
    }

    #[test]
    fn test_interrupt_after_external_cancel_is_silent() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sink = MemorySink::new();

        assert!(!on_interrupt(&cancel, &sink));
        assert!(sink.lines().is_empty());
    }
}
