use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use reqwest::Url;
use reqwest::blocking::ClientBuilder;
use serde::{Deserialize, Serialize};

use crate::error::QuakeError;
use crate::{fdsn, isc, query};

pub const CONFIG_FILE_NAME: &str = "eqfinder.json";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Optional JSON configuration; every field falls back to a built-in default.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub isc_endpoint: Option<String>,
    #[serde(default)]
    pub fdsn_endpoint: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub isc_preamble_lines: Option<usize>,
    #[serde(default)]
    pub isc_footer_lines: Option<usize>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl HttpSettings {
    pub fn client_builder(&self) -> ClientBuilder {
        reqwest::blocking::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub isc_endpoint: Url,
    pub fdsn_endpoint: Url,
    /// Lines of page chrome before the ISC CSV table.
    pub isc_preamble_lines: usize,
    /// Lines of page chrome after the ISC CSV table.
    pub isc_footer_lines: usize,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub http: HttpSettings,
    pub providers: ProviderSettings,
    pub output: Utf8PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path` when given; otherwise the first of `./eqfinder.json` and
    /// the user config file that exists, falling back to defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, QuakeError> {
        let config_path = match path {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(QuakeError::MissingConfig(path));
                }
                Some(path)
            }
            None => Self::candidate_paths().into_iter().find(|path| path.exists()),
        };

        let config = match config_path {
            Some(path) => Self::load(&path)?,
            None => Config::default(),
        };
        Self::resolve_config(config)
    }

    pub fn load(path: &Path) -> Result<Config, QuakeError> {
        let content =
            fs::read_to_string(path).map_err(|_| QuakeError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| QuakeError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, QuakeError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let isc_endpoint = parse_endpoint(config.isc_endpoint.as_deref(), isc::DEFAULT_ENDPOINT)?;
        let fdsn_endpoint =
            parse_endpoint(config.fdsn_endpoint.as_deref(), fdsn::DEFAULT_ENDPOINT)?;

        let http = HttpSettings {
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            user_agent: config.user_agent.unwrap_or_else(default_user_agent),
        };

        Ok(ResolvedConfig {
            schema_version,
            http,
            providers: ProviderSettings {
                isc_endpoint,
                fdsn_endpoint,
                isc_preamble_lines: config
                    .isc_preamble_lines
                    .unwrap_or(isc::DEFAULT_PREAMBLE_LINES),
                isc_footer_lines: config
                    .isc_footer_lines
                    .unwrap_or(isc::DEFAULT_FOOTER_LINES),
            },
            output: Utf8PathBuf::from(config.output.as_deref().unwrap_or(query::DEFAULT_OUTPUT)),
        })
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(path) = user_config_path() {
            paths.push(path);
        }
        paths
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join("eqfinder").join("config.json"))
}

fn default_user_agent() -> String {
    format!("eqfinder/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_endpoint(value: Option<&str>, default: &str) -> Result<Url, QuakeError> {
    let raw = value.unwrap_or(default);
    Url::parse(raw).map_err(|err| QuakeError::InvalidEndpoint(format!("{raw}: {err}")))
}
