// Command implementations behind the CLI

use super::prompt::{self, Prompter, TerminalPrompter};
use super::{output, GrepArgs};
use crate::config::Config;
use crate::error::{Result, SsmTailError};
use crate::logs::{FilterSpec, TerminalSink};
use crate::select::{resolve_targets, targets_for, BeanstalkSelector, Ec2Selector, Target};
use crate::session::{SessionBroker, SsmBroker};
use crate::stream::{Coordinator, SshTransport};
use std::future::Future;
use std::io::{IsTerminal, StdinLock, Stdout};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Tail platform logs of an Elastic Beanstalk environment.
///
/// On a terminal, an omitted environment, instance list or grep pattern is
/// asked for; otherwise the flags decide.
pub async fn eblogs(
    config: &Config,
    env: Option<String>,
    instances: &[String],
    log_paths: &[String],
    grep: &GrepArgs,
) -> Result<()> {
    let sdk_config = config.sdk_config().await;
    let selector = BeanstalkSelector::new(&sdk_config);
    let mut prompter = interactive_prompter();

    let environments = with_spinner("Looking up environments", selector.environments()).await?;

    let env_name = match (env, prompter.as_mut()) {
        (Some(env_name), _) => env_name,
        (None, Some(prompter)) => prompt::choose_environment(prompter, &environments)?,
        (None, None) => {
            output::print_environment_table(&environments);
            return Err(SsmTailError::Selection(
                "choose an environment with --env".to_string(),
            ));
        }
    };

    let available = if environments.iter().any(|e| e.name == env_name) {
        with_spinner("Looking up instances", selector.instance_ids(&env_name)).await?
    } else {
        Vec::new()
    };

    let requested = match prompter.as_mut() {
        Some(prompter) if instances.is_empty() && !available.is_empty() => {
            prompt::choose_instances(prompter, &available)?
        }
        _ => instances.to_vec(),
    };

    let targets = resolve_targets(
        &environments,
        &env_name,
        &available,
        &requested,
        log_paths,
        config,
    )?;
    let filter = grep.resolve(prompter.as_mut().map(|p| p as &mut dyn Prompter))?;
    drop(prompter);

    stream(config, &sdk_config, targets, filter).await
}

/// Tail explicit log paths on explicit instances
pub async fn tail(
    config: &Config,
    instances: &[String],
    log_paths: &[String],
    grep: &GrepArgs,
) -> Result<()> {
    let targets = targets_for(instances, log_paths)?;
    let filter = {
        let mut prompter = interactive_prompter();
        grep.resolve(prompter.as_mut().map(|p| p as &mut dyn Prompter))?
    };
    let sdk_config = config.sdk_config().await;

    stream(config, &sdk_config, targets, filter).await
}

/// Print the environment table
pub async fn list_environments(config: &Config) -> Result<()> {
    let sdk_config = config.sdk_config().await;
    let selector = BeanstalkSelector::new(&sdk_config);

    let environments = with_spinner("Looking up environments", selector.environments()).await?;
    output::print_environment_table(&environments);
    Ok(())
}

/// Attach the terminal to an interactive shell session on one instance
pub async fn start(config: &Config, instance: Option<String>) -> Result<()> {
    let sdk_config = config.sdk_config().await;

    let instance = match instance {
        Some(instance) => instance,
        None => {
            let selector = Ec2Selector::new(&sdk_config);
            let instances =
                with_spinner("Looking up running instances", selector.running_instances()).await?;

            match interactive_prompter() {
                Some(mut prompter) => prompt::choose_running_instance(&mut prompter, &instances)?,
                None => {
                    output::print_instance_table(&instances);
                    return Err(SsmTailError::Selection(
                        "choose an instance with --instance".to_string(),
                    ));
                }
            }
        }
    };

    let broker = SsmBroker::new(&sdk_config, config).interactive();
    let session = tokio::time::timeout(config.open_timeout(), broker.open(&instance))
        .await
        .map_err(|_| {
            SsmTailError::Timeout(format!("opening session for {} timed out", instance))
        })??;

    // Ctrl-C belongs to the remote shell while the plugin is attached
    let swallow_interrupts = tokio::spawn(async {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt left to the remote shell");
        }
    });

    let status = Command::new(&session.open_command)
        .args(&session.open_args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await;

    swallow_interrupts.abort();

    match status {
        Ok(status) => output::print_info(&format!("finished session ({})", status)),
        Err(e) => output::print_error(&format!(
            "failed to run {}: {}",
            session.open_command, e
        )),
    }

    tokio::time::timeout(config.close_timeout(), broker.close(&session.session_id))
        .await
        .map_err(|_| {
            SsmTailError::Timeout(format!("closing session {} timed out", session.session_id))
        })??;

    output::print_success_msg("terminated session");
    Ok(())
}

/// Terminal prompter, or `None` when stdin is not a terminal
fn interactive_prompter() -> Option<TerminalPrompter<StdinLock<'static>, Stdout>> {
    if std::io::stdin().is_terminal() {
        Some(TerminalPrompter::stdio())
    } else {
        debug!("stdin is not a terminal, selection comes from flags only");
        None
    }
}

/// Run the streaming engine over resolved targets until interrupted
async fn stream(
    config: &Config,
    sdk_config: &aws_config::SdkConfig,
    targets: Vec<Target>,
    filter: FilterSpec,
) -> Result<()> {
    output::print_targets(&targets);

    let coordinator = Coordinator::new(
        Arc::new(SsmBroker::new(sdk_config, config)),
        Arc::new(SshTransport::new(&config.ssh)),
        Arc::new(TerminalSink),
    )
    .with_timeouts(config.open_timeout(), config.close_timeout());

    let summary = coordinator.run_until_interrupted(targets, filter).await;
    info!(
        "{} of {} worker(s) closed cleanly",
        summary.closed, summary.workers
    );

    Ok(())
}

/// Await a cloud lookup behind a spinner
async fn with_spinner<T, F>(message: &str, lookup: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let pb = output::create_progress_bar(message);

    match lookup.await {
        Ok(value) => {
            output::finish_progress_success(pb, message);
            Ok(value)
        }
        Err(e) => {
            output::finish_progress_error(pb, message);
            Err(e)
        }
    }
}
