// Select module - Resolving which hosts and log files to tail

mod beanstalk;
mod ec2;

use crate::error::{Result, SsmTailError};

pub use beanstalk::{resolve_targets, BeanstalkSelector, Environment};
pub use ec2::{Ec2Selector, RunningInstance};

/// One remote host plus the log files to follow on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub log_paths: Vec<String>,
}

impl Target {
    pub fn new(id: impl Into<String>, log_paths: Vec<String>) -> Self {
        Self {
            id: id.into(),
            log_paths,
        }
    }
}

/// Build targets for explicitly named hosts sharing one set of log paths
///
/// Duplicate ids are dropped, keeping the first occurrence so color
/// assignment follows the operator's order.
pub fn targets_for(ids: &[String], log_paths: &[String]) -> Result<Vec<Target>> {
    if ids.is_empty() {
        return Err(SsmTailError::Selection("no instances selected".to_string()));
    }
    if log_paths.is_empty() {
        return Err(SsmTailError::Selection("no log paths selected".to_string()));
    }

    let mut targets: Vec<Target> = Vec::with_capacity(ids.len());
    for id in ids {
        if targets.iter().any(|t| &t.id == id) {
            continue;
        }
        targets.push(Target::new(id.clone(), log_paths.to_vec()));
    }

    Ok(targets)
}
