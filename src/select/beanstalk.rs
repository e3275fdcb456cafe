use crate::config::Config;
use crate::error::{Result, SsmTailError};
use crate::select::{targets_for, Target};
use aws_sdk_elasticbeanstalk::error::DisplayErrorContext;
use aws_sdk_elasticbeanstalk::Client;
use tracing::debug;

/// An Elastic Beanstalk environment and the platform it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub platform: String,
}

/// Looks up environments and their instances
pub struct BeanstalkSelector {
    client: Client,
}

impl BeanstalkSelector {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Live environments, in the order the API returns them
    pub async fn environments(&self) -> Result<Vec<Environment>> {
        let output = self
            .client
            .describe_environments()
            .include_deleted(false)
            .send()
            .await
            .map_err(|e| SsmTailError::Aws(DisplayErrorContext(&e).to_string()))?;

        let environments: Vec<Environment> = output
            .environments()
            .iter()
            .filter_map(|env| {
                Some(Environment {
                    name: env.environment_name()?.to_string(),
                    platform: env.solution_stack_name().unwrap_or_default().to_string(),
                })
            })
            .collect();

        debug!("Found {} environment(s)", environments.len());
        Ok(environments)
    }

    /// EC2 instance ids backing an environment
    pub async fn instance_ids(&self, env_name: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .describe_environment_resources()
            .environment_name(env_name)
            .send()
            .await
            .map_err(|e| SsmTailError::Aws(DisplayErrorContext(&e).to_string()))?;

        let ids: Vec<String> = output
            .environment_resources()
            .map(|resources| {
                resources
                    .instances()
                    .iter()
                    .filter_map(|instance| instance.id().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ids)
    }
}

/// Turn an environment choice into targets.
///
/// `requested` narrows the environment's instances (all of them when empty);
/// `log_override` replaces the platform's configured log paths when given.
pub fn resolve_targets(
    environments: &[Environment],
    env_name: &str,
    available: &[String],
    requested: &[String],
    log_override: &[String],
    config: &Config,
) -> Result<Vec<Target>> {
    let env = environments
        .iter()
        .find(|e| e.name == env_name)
        .ok_or_else(|| SsmTailError::Selection(format!("unknown environment '{}'", env_name)))?;

    let log_paths: Vec<String> = if log_override.is_empty() {
        config
            .log_paths_for(&env.platform)
            .ok_or_else(|| {
                SsmTailError::Selection(format!(
                    "no log paths configured for platform '{}'",
                    env.platform
                ))
            })?
            .to_vec()
    } else {
        log_override.to_vec()
    };

    if let Some(unknown) = requested.iter().find(|id| !available.contains(*id)) {
        return Err(SsmTailError::Selection(format!(
            "instance '{}' is not part of environment '{}'",
            unknown, env_name
        )));
    }

    let ids = if requested.is_empty() {
        available
    } else {
        requested
    };

    if ids.is_empty() {
        return Err(SsmTailError::Selection(format!(
            "environment '{}' has no instances",
            env_name
        )));
    }

    targets_for(ids, &log_paths)
}
