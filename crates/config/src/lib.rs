//! Layered configuration: built-in defaults, then a configuration file, then
//! `CMPACK_`-prefixed environment variables (nested keys separated by `__`,
//! e.g. `CMPACK_NETWORK__CONCURRENCY=8`).

pub mod error;
mod network;

pub use crate::network::NetworkConfig;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name shared with other CMSIS pack tooling, so an existing cache
/// is picked up.
pub const APP_NAME: &str = "cmsis-pack-manager";
pub const ENV_PREFIX: &str = "CMPACK_";
/// Master list of every pack published through the Keil pack repository.
pub const DEFAULT_SOURCE: &str = "https://www.keil.com/pack/index.pidx";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where `index.json` and `aliases.json` live.
    pub index_dir: PathBuf,
    /// Root of the descriptor and archive store.
    pub data_dir: PathBuf,
    /// URLs of vidx/pidx list documents, in priority order.
    pub sources: Vec<String>,
    /// Optional file with one list URL per line; appended to `sources`.
    pub vidx_list: Option<PathBuf>,
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data = default_data_dir();
        Self {
            index_dir: data.clone(),
            data_dir: data,
            sources: vec![DEFAULT_SOURCE.to_string()],
            vidx_list: None,
            network: NetworkConfig::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME))
}

/// Pick a figment file provider by extension.
fn file_provider(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

impl Config {
    /// Build the provider stack without extracting it.
    ///
    /// With an explicit file it must exist; otherwise `config.{toml,yaml,json}`
    /// in the platform configuration directory are merged if present.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = file_provider(figment, path)?;
            },
            None => {
                if let Some(dirs) = project_dirs() {
                    for name in ["config.toml", "config.yaml", "config.json"] {
                        let candidate = dirs.config_dir().join(name);
                        if candidate.is_file() {
                            debug!(path = %candidate.display(), "Using configuration file");
                            figment = file_provider(figment, &candidate)?;
                        }
                    }
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load, absolutise and validate the configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(explicit)?)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let mut config: Config = figment.extract().or_raise(|| ErrorKind::Invalid)?;
        config.index_dir = absolute(config.index_dir)?;
        config.data_dir = absolute(config.data_dir)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.concurrency == 0 {
            exn::bail!(ErrorKind::Validation("network.concurrency must be at least 1".to_string()));
        }
        if self.sources.is_empty() && self.vidx_list.is_none() {
            exn::bail!(ErrorKind::Validation("no pack sources configured".to_string()));
        }
        if let Some(source) = self.sources.iter().find(|source| !is_http_url(source)) {
            exn::bail!(ErrorKind::Validation(format!("pack source is not an http(s) URL: {source}")));
        }
        Ok(())
    }

    /// Every list URL to fetch: `sources` followed by the entries of
    /// `vidx_list`, skipping blank lines, `#` comments and duplicates.
    pub fn list_urls(&self) -> Result<Vec<String>> {
        let mut urls = self.sources.clone();
        if let Some(path) = &self.vidx_list {
            let contents = std::fs::read_to_string(path).or_raise(|| ErrorKind::ListFile(path.clone()))?;
            urls.extend(parse_list_file(&contents));
        }
        let mut seen = std::collections::HashSet::new();
        urls.retain(|url| seen.insert(url.clone()));
        Ok(urls)
    }
}

fn parse_list_file(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    std::path::absolute(&path).or_raise(|| ErrorKind::Validation(format!("cannot resolve path {}", path.display())))
}
