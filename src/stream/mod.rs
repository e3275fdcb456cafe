// Stream module - Concurrent multi-target remote tailing

pub mod coordinator;
pub mod transport;
pub mod worker;

pub use coordinator::{
    on_interrupt, spawn_interrupt_listener, Coordinator, RunSummary, FINISHED_MARKER,
    INTERRUPT_ACK,
};
pub use transport::{spawn_transport, SpawnedTransport, SshTransport, Transport};
pub use worker::{StreamWorker, WorkerContext, WorkerState};
