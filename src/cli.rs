//! Command line surface: argument definitions and dispatch into the workflows.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};
use tracing::debug;

use crate::api;
use crate::config::Config;
use crate::error::{UpError, UpResult};

#[derive(Parser, Debug)]
#[command(name = "upctl", version, about = "Upload files to an upload api", long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/upctl/upctl.toml)
    #[arg(short = 'c', long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print retries, request traces and raw responses
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Upload api endpoint
    #[arg(short = 'u', long, global = true, value_hint = ValueHint::Url)]
    pub endpoint: Option<String>,

    /// Api key sent as bearer token
    #[arg(short = 'a', long, global = true)]
    pub apikey: Option<String>,

    /// How often to retry a failed request
    #[arg(short = 'r', long, global = true)]
    pub retries: Option<u32>,

    /// Tenant context to act for
    #[arg(short = 't', long = "context", global = true)]
    pub apicontext: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload files to an upload api
    Upload {
        /// Expire setting: asap or duration (accepted shortcuts: dmh)
        #[arg(short = 'e', long)]
        expire: Option<String>,

        /// Files or directories to upload
        #[arg(value_hint = ValueHint::AnyPath)]
        files: Vec<PathBuf>,
    },

    /// Show the uploads of a tenant context
    #[command(visible_aliases = ["des", "info", "i", "list", "ls"])]
    Describe {
        /// Tenant context identifier (default: --context or configured apicontext)
        id: Option<String>,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Upload { .. } => "upload",
            Commands::Describe { .. } => "describe",
        }
    }
}

impl Cli {
    /// Load the layered configuration and apply command line overrides.
    pub fn resolve_config(&self, version: &str) -> UpResult<Config> {
        let mut config = Config::load(self.config.as_deref())?.with_version(version);

        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(apikey) = &self.apikey {
            config.apikey = Some(apikey.clone());
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(apicontext) = &self.apicontext {
            config.apicontext = apicontext.clone();
        }
        config.debug |= self.debug;

        debug!("Resolved config: endpoint={} retries={}", config.endpoint, config.retries);
        Ok(config)
    }
}

/// Validate arguments, then run the selected workflow.
///
/// Argument errors are reported before any request is prepared. A describe
/// without id only fails once the configured context turns out empty too.
pub fn execute_command(cli: &Cli, version: &str) -> UpResult<String> {
    match &cli.command {
        Commands::Upload { expire, files } => {
            if files.is_empty() {
                return Err(UpError::Usage("No files specified to upload!".into()));
            }
            let mut config = cli.resolve_config(version)?;
            if let Some(expire) = expire {
                config.expire = expire.clone();
            }
            api::upload(&config, files)
        }
        Commands::Describe { id } => {
            let id = id.as_deref().filter(|id| !id.is_empty());
            let mut config = cli.resolve_config(version)?;
            let apicontext = describe_context(id, &config)?;
            config.apicontext = apicontext.clone();
            api::list(&config, &apicontext)
        }
    }
}

/// The tenant context a describe call targets: the positional id, else the
/// context from `--context` or the configuration.
fn describe_context(id: Option<&str>, config: &Config) -> UpResult<String> {
    match id {
        Some(id) => Ok(id.to_string()),
        None if !config.apicontext.is_empty() => Ok(config.apicontext.clone()),
        None => Err(UpError::Usage("No id specified to describe!".into())),
    }
}
