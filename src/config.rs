// src/config.rs

//! Configuration document
//!
//! The configuration is a JSON document with three sections:
//! - `platforms`: platform name -> target directory and permitted architectures
//! - `artefacts`: platform name -> list of artefacts with their source descriptor
//! - `settings`: optional HTTP and archive tool settings
//!
//! Everything that can be checked without touching the network is checked
//! at load time, so a bad configuration fails before any request is made.

use crate::error::{Error, Result};
use crate::resolver::{compile_pattern, parse_selector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Name of the per-platform working directory when none is configured
const DEFAULT_WORKING_DIR: &str = "temp";

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default retry attempts for page and API fetches
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default archive tool executable
const DEFAULT_ARCHIVER: &str = "7zz";

/// Top-level configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Location of the persisted run-state document
    #[serde(rename = "stateFile", alias = "state_file")]
    pub state_file: PathBuf,

    platforms: IndexMap<String, PlatformEntry>,

    #[serde(default)]
    artefacts: IndexMap<String, Vec<ArtefactConfig>>,

    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Deserialize)]
struct PlatformEntry {
    directory: PathBuf,
    architectures: Vec<String>,
    #[serde(default)]
    temporary_directory: Option<PathBuf>,
}

/// A platform with its directories resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub name: String,
    pub directory: PathBuf,
    pub working_directory: PathBuf,
    pub architectures: BTreeSet<String>,
}

impl PlatformConfig {
    pub fn new(name: &str, directory: impl Into<PathBuf>, architectures: &[&str]) -> Self {
        let directory = directory.into();
        Self {
            name: name.to_string(),
            working_directory: directory.join(DEFAULT_WORKING_DIR),
            directory,
            architectures: architectures.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn permits(&self, architecture: &str) -> bool {
        self.architectures.contains(architecture)
    }
}

/// One configured artefact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtefactConfig {
    pub name: String,
    pub architecture: String,
    #[serde(rename = "src")]
    pub source: SourceConfig,
}

/// Source descriptor, tagged by `from`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "lowercase")]
pub enum SourceConfig {
    Direct(DirectSource),
    Webpage(WebpageSource),
    Github(GithubSource),
    Sourceforge(SourceforgeSource),
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::Direct(_) => SourceKind::Direct,
            SourceConfig::Webpage(_) => SourceKind::Webpage,
            SourceConfig::Github(_) => SourceKind::Github,
            SourceConfig::Sourceforge(_) => SourceKind::Sourceforge,
        }
    }
}

/// Fixed URL and version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectSource {
    pub url: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Link scraped from a web page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebpageSource {
    pub url: String,
    pub selector: String,
    pub attribute: String,
    pub version_regex: String,
}

/// Asset of a GitHub release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubSource {
    pub owner: String,
    pub repository: String,
    /// Release tag; empty, missing or "latest" selects the latest release
    #[serde(default)]
    pub tag: Option<String>,
    pub regex: String,
}

/// File from a SourceForge project folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceforgeSource {
    pub project: String,
    pub folder: String,
    /// Version to fetch; empty, missing or "latest" triggers discovery
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub version_finder: Option<VersionFinder>,
    /// Filename pattern; `{version}` is replaced by the resolved version
    pub filename_regex: String,
}

/// Where to find the latest version on a project's file listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionFinder {
    pub selector: String,
    pub regex: String,
}

/// True when a configured tag or version asks for the newest one
pub fn is_latest(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || v.eq_ignore_ascii_case("latest"),
    }
}

/// Closed set of source kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Direct,
    Webpage,
    Github,
    Sourceforge,
}

impl SourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            SourceKind::Direct => "direct",
            SourceKind::Webpage => "webpage",
            SourceKind::Github => "github",
            SourceKind::Sourceforge => "sourceforge",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP and archive tool settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub archiver: String,
    pub user_agent: String,
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            archiver: DEFAULT_ARCHIVER.to_string(),
            user_agent: format!("artefact-downloader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigError(format!(
                    "Configuration file not found: {}",
                    path.display()
                ))
            } else {
                Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
            }
        })?;

        Self::from_json_str(&content)
    }

    /// Parse and validate a configuration document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Bad configuration document: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Platforms in declaration order
    pub fn platforms(&self) -> Vec<Arc<PlatformConfig>> {
        self.platforms
            .iter()
            .map(|(name, entry)| {
                Arc::new(PlatformConfig {
                    name: name.clone(),
                    directory: entry.directory.clone(),
                    working_directory: entry
                        .temporary_directory
                        .clone()
                        .unwrap_or_else(|| entry.directory.join(DEFAULT_WORKING_DIR)),
                    architectures: entry.architectures.iter().cloned().collect(),
                })
            })
            .collect()
    }

    /// Artefacts configured for a platform, in declaration order
    pub fn artefacts_for(&self, platform: &str) -> &[ArtefactConfig] {
        self.artefacts
            .get(platform)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    fn validate(&self) -> Result<()> {
        for platform in self.artefacts.keys() {
            if !self.platforms.contains_key(platform) {
                return Err(Error::ConfigError(format!(
                    "Artefacts listed for unknown platform: {}",
                    platform
                )));
            }
        }

        for (platform, entry) in &self.platforms {
            for artefact in self.artefacts_for(platform) {
                if !entry.architectures.contains(&artefact.architecture) {
                    return Err(Error::ConfigError(format!(
                        "Unknown architecture {} for {}/{}",
                        artefact.architecture, platform, artefact.name
                    )));
                }

                validate_source(&artefact.source).map_err(|e| {
                    Error::ConfigError(format!("{}/{}: {}", platform, artefact.name, e))
                })?;
            }
        }

        Ok(())
    }
}

/// Check that every pattern and selector in a source descriptor compiles
fn validate_source(source: &SourceConfig) -> Result<()> {
    match source {
        SourceConfig::Direct(_) => {}
        SourceConfig::Webpage(src) => {
            parse_selector(&src.selector)?;
            compile_pattern(&src.version_regex)?;
        }
        SourceConfig::Github(src) => {
            compile_pattern(&src.regex)?;
        }
        SourceConfig::Sourceforge(src) => {
            match &src.version_finder {
                Some(finder) => {
                    parse_selector(&finder.selector)?;
                    compile_pattern(&finder.regex)?;
                }
                None if is_latest(src.version.as_deref()) => {
                    return Err(Error::ConfigError(
                        "version_finder is required when version is latest".to_string(),
                    ));
                }
                None => {}
            }
            compile_pattern(&src.filename_regex.replace("{version}", "0"))?;
        }
    }
    Ok(())
}
