//! Configuration with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Config file: `--config PATH`, or `$XDG_CONFIG_HOME/upctl/upctl.toml` if present
//! 3. Environment variables: `UPCTL_*` prefix
//! 4. Command line flags (applied by the caller, see `cli`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::error::{UpError, UpResult};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_RETRIES: u32 = 3;

/// A named credential scope: which tenant a request acts for.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiContext {
    pub context: String,
    pub key: String,
}

/// Fully resolved settings handed to the upload and list workflows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the upload api, path suffixes are appended to it
    pub endpoint: String,
    /// Static bearer token
    pub apikey: Option<String>,
    /// Number of retries after a failed attempt, 0 disables retrying
    pub retries: u32,
    pub debug: bool,
    /// Raw expire directive, validated before upload
    pub expire: String,
    /// Selected tenant context
    pub apicontext: String,
    /// Known tenant contexts (config file only)
    pub apicontexts: Vec<ApiContext>,
    /// Overall request timeout in seconds, 0 means no timeout
    pub timeout: u64,
    /// Client version for the User-Agent, injected by the binary
    #[serde(skip)]
    pub version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            apikey: None,
            retries: DEFAULT_RETRIES,
            debug: false,
            expire: String::new(),
            apicontext: String::new(),
            apicontexts: Vec::new(),
            timeout: 0,
            version: String::new(),
        }
    }
}

/// Default config file location, if a config dir is known on this platform.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("upctl").join("upctl.toml"))
}

fn config_err(e: config::ConfigError) -> UpError {
    UpError::Config(e.to_string())
}

impl Config {
    /// Load defaults, config file and environment.
    ///
    /// An explicitly given file must exist, the default location is optional.
    pub fn load(path: Option<&Path>) -> UpResult<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                debug!("Loading config file {}", path.display());
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = default_config_path() {
                    debug!("Probing config file {}", default_path.display());
                    builder = builder.add_source(File::from(default_path).required(false));
                }
            }
        }

        builder = builder.add_source(Environment::with_prefix("UPCTL").try_parsing(true));

        builder
            .build()
            .map_err(config_err)?
            .try_deserialize::<Config>()
            .map_err(config_err)
    }

    /// Attach the client version used in the User-Agent header.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The token sent as `Authorization: Bearer`.
    ///
    /// An explicit api key wins, otherwise the key of the selected tenant
    /// context is used.
    pub fn bearer_token(&self) -> Option<&str> {
        if let Some(key) = self.apikey.as_deref().filter(|k| !k.is_empty()) {
            return Some(key);
        }
        self.apicontexts
            .iter()
            .find(|c| c.context == self.apicontext)
            .map(|c| c.key.as_str())
            .filter(|k| !k.is_empty())
    }

    pub fn user_agent(&self) -> String {
        format!("upctl-{}", self.version)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}
