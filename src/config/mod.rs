use crate::error::{Result, SsmTailError};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Top-level configuration, loaded from an optional TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// AWS region used for every API call and for the session plugin
    #[serde(default = "default_region")]
    pub region: String,

    /// AWS shared-config profile (falls back to the SDK default chain)
    #[serde(default)]
    pub profile: Option<String>,

    /// Session broker settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Secure-shell transport settings
    #[serde(default)]
    pub ssh: SshConfig,

    /// Platform keyword -> log paths tailed on hosts of that platform
    #[serde(default = "default_platforms")]
    pub platforms: BTreeMap<String, Vec<String>>,
}

/// Session broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// SSM document used for the SSH tunnel
    #[serde(default = "default_document")]
    pub document: String,

    /// Session manager plugin executable
    #[serde(default = "default_plugin")]
    pub plugin: String,

    /// Deadline for opening a session (in seconds)
    #[serde(default = "default_open_timeout")]
    pub open_timeout_secs: u64,

    /// Deadline for closing a session (in seconds)
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,
}

/// Secure-shell transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// ssh executable
    #[serde(default = "default_ssh_program")]
    pub program: String,

    /// Remote login user
    #[serde(default = "default_ssh_user")]
    pub user: String,

    /// Remote sshd port, also forwarded as the tunnel's portNumber
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Private key passed with -i
    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    #[serde(default)]
    pub strict_host_key_checking: bool,
}

// Default value functions for serde
fn default_region() -> String {
    "ap-northeast-2".to_string()
}

fn default_document() -> String {
    "AWS-StartSSHSession".to_string()
}

fn default_plugin() -> String {
    "session-manager-plugin".to_string()
}

fn default_open_timeout() -> u64 {
    30
}

fn default_close_timeout() -> u64 {
    10
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_ssh_user() -> String {
    "ec2-user".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_platforms() -> BTreeMap<String, Vec<String>> {
    let mut platforms = BTreeMap::new();
    platforms.insert(
        "node.js".to_string(),
        vec!["/var/log/nodejs/nodejs.log".to_string()],
    );
    platforms.insert(
        "java".to_string(),
        vec![
            "/var/log/web-1.log".to_string(),
            "/var/log/web-1.error.log".to_string(),
        ],
    );
    platforms
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            document: default_document(),
            plugin: default_plugin(),
            open_timeout_secs: default_open_timeout(),
            close_timeout_secs: default_close_timeout(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: default_ssh_program(),
            user: default_ssh_user(),
            port: default_ssh_port(),
            identity_file: None,
            strict_host_key_checking: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            profile: None,
            session: SessionConfig::default(),
            ssh: SshConfig::default(),
            platforms: default_platforms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SsmTailError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::parse_toml(&contents)?;
        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise use the built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Config::default()),
        }
    }

    fn parse_toml(contents: &str) -> Result<Config> {
        toml::from_str(contents)
            .map_err(|e| SsmTailError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply command-line overrides on top of the file values
    pub fn with_overrides(mut self, region: Option<String>, profile: Option<String>) -> Self {
        if let Some(region) = region {
            self.region = region;
        }
        if profile.is_some() {
            self.profile = profile;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(SsmTailError::ConfigValidation(
                "region must not be empty".to_string(),
            ));
        }

        if self.session.open_timeout_secs == 0 || self.session.close_timeout_secs == 0 {
            return Err(SsmTailError::ConfigValidation(
                "session timeouts must be at least 1 second".to_string(),
            ));
        }

        if self.session.plugin.trim().is_empty() || self.ssh.program.trim().is_empty() {
            return Err(SsmTailError::ConfigValidation(
                "plugin and ssh program must not be empty".to_string(),
            ));
        }

        if self.ssh.port == 0 {
            return Err(SsmTailError::ConfigValidation(
                "ssh port must be between 1 and 65535".to_string(),
            ));
        }

        if self.ssh.user.trim().is_empty() {
            return Err(SsmTailError::ConfigValidation(
                "ssh user must not be empty".to_string(),
            ));
        }

        if let Some((platform, _)) = self.platforms.iter().find(|(_, paths)| paths.is_empty()) {
            return Err(SsmTailError::ConfigValidation(format!(
                "platform '{}' has no log paths",
                platform
            )));
        }

        Ok(())
    }

    /// Shared AWS SDK configuration for this region and profile
    pub async fn sdk_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()));

        if let Some(ref profile) = self.profile {
            loader = loader.profile_name(profile);
        }

        loader.load().await
    }

    /// Profile name handed to the session plugin
    pub fn profile_name(&self) -> &str {
        self.profile.as_deref().unwrap_or("default")
    }

    /// Get the open deadline as Duration
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.session.open_timeout_secs)
    }

    /// Get the close deadline as Duration
    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.session.close_timeout_secs)
    }

    /// Log paths for a platform stack name.
    ///
    /// Matches when a configured keyword is a case-insensitive substring of
    /// the stack name, e.g. `node.js` in
    /// "64bit Amazon Linux 2 v5.8.0 running Node.js 18".
    pub fn log_paths_for(&self, stack_name: &str) -> Option<&[String]> {
        let stack = stack_name.to_lowercase();
        self.platforms
            .iter()
            .find(|(keyword, _)| stack.contains(&keyword.to_lowercase()))
            .map(|(_, paths)| paths.as_slice())
    }

    fn expand_env_vars(&mut self) {
        if let Some(ref identity) = self.ssh.identity_file {
            let expanded = expand_env_in_string(&identity.to_string_lossy());
            self.ssh.identity_file = Some(PathBuf::from(expanded));
        }

        for paths in self.platforms.values_mut() {
            for path in paths.iter_mut() {
                *path = expand_env_in_string(path);
            }
        }
    }
}

static ENV_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+)\}|\$(\w+)").unwrap());

/// Expand `$VAR` and `${VAR}` references.
///
/// Each reference is resolved by its whole name; unset variables are left as
/// written.
fn expand_env_in_string(s: &str) -> String {
    ENV_REF_RE
        .replace_all(s, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
