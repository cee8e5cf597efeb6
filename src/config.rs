//! Run configuration: command-line flags, optionally layered over a YAML file.
//!
//! Every flag has a kebab-case YAML key of the same name. Flags given on the
//! command line win over file values; property filters from both are combined.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::broker::amqp::BrokerEndpoint;
use crate::error::ConfigError;
use crate::filter::PropertyFilter;
use crate::protocol::DEFAULT_TRACKING_PROPERTY;
use crate::removal::RemovalMode;

/// Default wait for the next browse response before the stream is considered done.
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 6000;

/// Command-line interface.
#[derive(Parser, Debug, Default)]
#[command(name = "scheduler-migrate")]
#[command(
    about = "Copies scheduled jobs from a broker's scheduler store to another broker and/or a directory"
)]
pub struct Cli {
    /// YAML file providing defaults for any of the options below
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Source broker url
    #[arg(long = "source-broker", value_name = "URL")]
    pub source_broker: Option<String>,

    /// Source broker username
    #[arg(long = "source-user")]
    pub source_user: Option<String>,

    /// Source broker password
    #[arg(long = "source-pass")]
    pub source_pass: Option<String>,

    /// Milliseconds to wait for the next browse response [default: 6000]
    #[arg(long = "source-timeout", value_name = "MS")]
    pub source_timeout: Option<u64>,

    /// Remove from source: never, always, success, error [default: never]
    #[arg(long = "source-rm", value_name = "MODE")]
    pub source_rm: Option<RemovalMode>,

    /// Target broker url
    #[arg(long = "target-broker", value_name = "URL")]
    pub target_broker: Option<String>,

    /// Target broker username
    #[arg(long = "target-user")]
    pub target_user: Option<String>,

    /// Target broker password
    #[arg(long = "target-pass")]
    pub target_pass: Option<String>,

    /// Target directory
    #[arg(long = "target-dir", value_name = "DIR")]
    pub target_dir: Option<PathBuf>,

    /// Property holding the source scheduler id on migrated jobs [default: originalScheduledJobId]
    #[arg(long = "target-id", value_name = "PROPERTY")]
    pub target_id: Option<String>,

    /// Do not alter broker state by either forwarding to target or removing from source
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Property filter, e.g. type=^invoice$ (repeatable)
    #[arg(long = "property-filter", value_name = "NAME=REGEX")]
    pub property_filter: Vec<String>,
}

/// Options read from a YAML file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub source_broker: Option<String>,
    pub source_user: Option<String>,
    pub source_pass: Option<String>,
    pub source_timeout: Option<u64>,
    pub source_rm: Option<RemovalMode>,
    pub target_broker: Option<String>,
    pub target_user: Option<String>,
    pub target_pass: Option<String>,
    pub target_dir: Option<PathBuf>,
    pub target_id: Option<String>,
    pub dry_run: bool,
    pub property_filter: Vec<String>,
}

impl FileConfig {
    /// Loads options from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(io_error)?;
        let mut content = String::new();
        file.read_to_string(&mut content).map_err(io_error)?;
        Self::from_yaml(&content)
    }

    /// Parses options from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Fully resolved options for one migration run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: BrokerEndpoint,
    pub source_timeout: Duration,
    pub removal_mode: RemovalMode,
    pub target: Option<BrokerEndpoint>,
    pub target_dir: Option<PathBuf>,
    pub tracking_property: String,
    pub dry_run: bool,
    pub filter: PropertyFilter,
}

impl Cli {
    /// Resolves flags, reading `--config` first when given.
    pub fn resolve(self) -> Result<RunConfig, ConfigError> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        self.resolve_with(file)
    }

    /// Resolves flags over an already loaded file configuration.
    pub fn resolve_with(self, file: FileConfig) -> Result<RunConfig, ConfigError> {
        let source_url = self
            .source_broker
            .or(file.source_broker)
            .ok_or(ConfigError::MissingSourceBroker)?;

        let source_timeout = self
            .source_timeout
            .or(file.source_timeout)
            .unwrap_or(DEFAULT_SOURCE_TIMEOUT_MS);
        let removal_mode = self.source_rm.or(file.source_rm).unwrap_or_default();

        let target = self
            .target_broker
            .or(file.target_broker)
            .map(|url| BrokerEndpoint {
                url,
                username: self.target_user.or(file.target_user),
                password: self.target_pass.or(file.target_pass),
            });

        let filter = PropertyFilter::parse(
            file.property_filter
                .iter()
                .chain(self.property_filter.iter()),
        )?;

        Ok(RunConfig {
            source: BrokerEndpoint {
                url: source_url,
                username: self.source_user.or(file.source_user),
                password: self.source_pass.or(file.source_pass),
            },
            source_timeout: Duration::from_millis(source_timeout),
            removal_mode,
            target,
            target_dir: self.target_dir.or(file.target_dir),
            tracking_property: self
                .target_id
                .or(file.target_id)
                .unwrap_or_else(|| DEFAULT_TRACKING_PROPERTY.to_string()),
            dry_run: self.dry_run || file.dry_run,
            filter,
        })
    }
}
