// CLI module - User-facing command-line interface

mod commands;
mod output;
mod prompt;

use crate::config::Config;
use crate::error::Result;
use crate::logs::FilterSpec;
use clap::{Args, Parser, Subcommand};
use prompt::Prompter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ssmtail - tail remote log files over AWS Session Manager
#[derive(Parser)]
#[command(name = "ssmtail")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// AWS profile name
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail Elastic Beanstalk platform logs (tail -F)
    Eblogs {
        /// Environment name (prompted for on a terminal when omitted)
        #[arg(short, long)]
        env: Option<String>,

        /// Instances to tail (prompted for on a terminal, otherwise every
        /// instance of the environment)
        #[arg(short, long = "instance")]
        instances: Vec<String>,

        /// Log files to tail instead of the platform defaults
        #[arg(short, long = "log-path")]
        log_paths: Vec<String>,

        #[command(flatten)]
        grep: GrepArgs,
    },

    /// Tail log files on arbitrary instances
    Tail {
        /// Instances to tail
        #[arg(short, long = "instance", required = true)]
        instances: Vec<String>,

        /// Log files to tail on every instance
        #[arg(short, long = "log-path", required = true)]
        log_paths: Vec<String>,

        #[command(flatten)]
        grep: GrepArgs,
    },

    /// List Elastic Beanstalk environments
    Envs,

    /// Start an interactive shell session
    Start {
        /// Instance to connect to (prompted for on a terminal when omitted)
        #[arg(short, long)]
        instance: Option<String>,
    },
}

/// Line selection options shared by the tailing commands
#[derive(Args)]
struct GrepArgs {
    /// Only print lines matching this regular expression (prompted for on a
    /// terminal when omitted)
    #[arg(short, long)]
    grep: Option<String>,

    /// Print N lines of trailing context after each match
    #[arg(short = 'A', long = "after-context", default_value = "0")]
    after_context: usize,
}

impl GrepArgs {
    fn filter_spec(&self) -> Result<FilterSpec> {
        FilterSpec::new(self.grep.as_deref(), self.after_context)
    }

    /// Like `filter_spec`, but asks for the pattern when `--grep` was not
    /// given and a prompter is available
    fn resolve(&self, prompter: Option<&mut dyn Prompter>) -> Result<FilterSpec> {
        match (&self.grep, prompter) {
            (None, Some(prompter)) => prompt::ask_filter(prompter, self.after_context),
            _ => self.filter_spec(),
        }
    }
}

impl Cli {
    /// Run the CLI application
    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        init_tracing(cli.verbose);

        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(cli.execute())
    }

    /// Execute the parsed command
    async fn execute(self) -> Result<()> {
        let config =
            Config::load(self.config.as_deref())?.with_overrides(self.region, self.profile);
        config.validate()?;

        match self.command {
            Commands::Eblogs {
                env,
                instances,
                log_paths,
                grep,
            } => commands::eblogs(&config, env, &instances, &log_paths, &grep).await,

            Commands::Tail {
                instances,
                log_paths,
                grep,
            } => commands::tail(&config, &instances, &log_paths, &grep).await,

            Commands::Envs => commands::list_environments(&config).await,

            Commands::Start { instance } => commands::start(&config, instance).await,
        }
    }
}

/// Diagnostics go to stderr so they never mix with tailed lines
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SSMTAIL_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eblogs() {
        let cli = Cli::try_parse_from([
            "ssmtail", "eblogs", "--env", "api-prod", "-i", "i-1", "-i", "i-2", "--grep",
            "ERROR", "-A", "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Eblogs {
                env,
                instances,
                log_paths,
                grep,
            } => {
                assert_eq!(env.as_deref(), Some("api-prod"));
                assert_eq!(instances, vec!["i-1", "i-2"]);
                assert!(log_paths.is_empty());
                assert_eq!(grep.grep.as_deref(), Some("ERROR"));
                assert_eq!(grep.after_context, 3);
            }
            _ => panic!("Expected eblogs command"),
        }
    }

    #[test]
    fn test_tail_requires_instance_and_path() {
        assert!(Cli::try_parse_from(["ssmtail", "tail", "-l", "/var/log/app.log"]).is_err());
        assert!(Cli::try_parse_from(["ssmtail", "tail", "-i", "i-1"]).is_err());
        assert!(
            Cli::try_parse_from(["ssmtail", "tail", "-i", "i-1", "-l", "/var/log/app.log"]).is_ok()
        );
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli =
            Cli::try_parse_from(["ssmtail", "envs", "--region", "us-west-2", "-v"]).unwrap();
        assert_eq!(cli.region.as_deref(), Some("us-west-2"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_grep_args_build_filter() {
        let args = GrepArgs {
            grep: Some("  ".to_string()),
            after_context: 2,
        };
        assert!(args.filter_spec().unwrap().is_pass_through());

        let args = GrepArgs {
            grep: Some("[".to_string()),
            after_context: 0,
        };
        assert!(args.filter_spec().is_err());
    }

    #[test]
    fn test_grep_args_prompt_only_without_flag() {
        let mut prompter = prompt::TerminalPrompter::new("ERROR\n4\n".as_bytes(), Vec::new());
        let args = GrepArgs {
            grep: None,
            after_context: 0,
        };
        let filter = args.resolve(Some(&mut prompter)).unwrap();
        assert_eq!(filter.context(), 4);

        let args = GrepArgs {
            grep: None,
            after_context: 0,
        };
        assert!(args.resolve(None).unwrap().is_pass_through());

        let mut prompter = prompt::TerminalPrompter::new("unused\n".as_bytes(), Vec::new());
        let args = GrepArgs {
            grep: Some("WARN".to_string()),
            after_context: 1,
        };
        let filter = args.resolve(Some(&mut prompter)).unwrap();
        assert!(!filter.is_pass_through());
        assert_eq!(filter.context(), 1);
    }
}
