// Session module - Tunnel sessions opened and closed through a broker

pub mod ssm;

use crate::error::Result;
use async_trait::async_trait;

pub use ssm::SsmBroker;

/// One opened remote tunnel session
///
/// `open_command` plus `open_args` is the process that carries traffic
/// through the session (for SSM, the session manager plugin invocation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: String,
    pub open_command: String,
    pub open_args: Vec<String>,
}

impl SessionHandle {
    pub fn new(
        session_id: impl Into<String>,
        open_command: impl Into<String>,
        open_args: Vec<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            open_command: open_command.into(),
            open_args,
        }
    }
}

/// Opens and closes tunnel sessions for targets
#[async_trait]
pub trait SessionBroker: Send + Sync {
    /// Open a session to the target with the given identifier
    async fn open(&self, target_id: &str) -> Result<SessionHandle>;

    /// Terminate a previously opened session
    async fn close(&self, session_id: &str) -> Result<()>;
}
