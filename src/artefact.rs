// src/artefact.rs

//! Artefact lifecycle
//!
//! An [`Artefact`] wraps one configured download slot and its resolver.
//! It moves through a fixed set of states:
//!
//! ```text
//! Initialised --resolve--> ReadyToDownload --download--> Downloaded
//!      \
//!       `--resolve fails--> ResolutionError
//! ```
//!
//! URL and version are only readable once resolved; the local file, its
//! hash and the archive operations only once downloaded. Asking earlier
//! is an `InvalidState` error, never a default value.

use crate::archive::{skips_archive_check, ArchiveTool};
use crate::config::{ArtefactConfig, PlatformConfig, SourceKind};
use crate::download::{download_to_dir, DownloadedFile};
use crate::error::{Error, Result};
use crate::http::Transport;
use crate::identity::{identify, Identifier};
use crate::resolver::{self, Resolver};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle state of an artefact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtefactStatus {
    Initialised,
    ReadyToDownload,
    ResolutionError,
    Downloaded,
}

impl ArtefactStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ArtefactStatus::Initialised => "initialised",
            ArtefactStatus::ReadyToDownload => "ready to download",
            ArtefactStatus::ResolutionError => "unresolved",
            ArtefactStatus::Downloaded => "downloaded",
        }
    }

    /// Allowed transitions
    pub fn can_transition_to(&self, next: ArtefactStatus) -> bool {
        matches!(
            (self, next),
            (ArtefactStatus::Initialised, ArtefactStatus::ReadyToDownload)
                | (ArtefactStatus::Initialised, ArtefactStatus::ResolutionError)
                | (ArtefactStatus::ReadyToDownload, ArtefactStatus::Downloaded)
        )
    }

    /// URL and version are known
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            ArtefactStatus::ReadyToDownload | ArtefactStatus::Downloaded
        )
    }
}

impl fmt::Display for ArtefactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured artefact and everything learned about it this run
pub struct Artefact {
    platform: Arc<PlatformConfig>,
    config: ArtefactConfig,
    identifier: Identifier,
    resolver: Box<dyn Resolver>,
    status: ArtefactStatus,
    download_url: Option<String>,
    version: Option<String>,
    downloaded: Option<DownloadedFile>,
}

impl Artefact {
    /// Create an artefact slot; the architecture must be permitted by the platform
    pub fn new(platform: Arc<PlatformConfig>, config: ArtefactConfig) -> Result<Self> {
        if !platform.permits(&config.architecture) {
            return Err(Error::ConfigError(format!(
                "Unknown architecture {} for {}/{}",
                config.architecture, platform.name, config.name
            )));
        }

        let identifier = identify(
            &platform.directory.to_string_lossy(),
            &config.name,
            &config.architecture,
        );
        let resolver = resolver::for_source(&config.source);

        Ok(Self {
            platform,
            config,
            identifier,
            resolver,
            status: ArtefactStatus::Initialised,
            download_url: None,
            version: None,
            downloaded: None,
        })
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn status(&self) -> ArtefactStatus {
        self.status
    }

    pub fn platform(&self) -> &PlatformConfig {
        &self.platform
    }

    pub fn config(&self) -> &ArtefactConfig {
        &self.config
    }

    pub fn kind(&self) -> SourceKind {
        self.resolver.kind()
    }

    /// `platform/name/architecture`
    pub fn label(&self) -> String {
        format!(
            "{}/{}/{}",
            self.platform.name, self.config.name, self.config.architecture
        )
    }

    fn transition(&mut self, next: ArtefactStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(self.invalid_state(next.as_str()));
        }
        debug!("{}: {} -> {}", self.label(), self.status, next);
        self.status = next;
        Ok(())
    }

    fn invalid_state(&self, required: &str) -> Error {
        Error::InvalidState {
            artefact: self.label(),
            actual: self.status.to_string(),
            required: required.to_string(),
        }
    }

    fn require_resolved(&self) -> Result<()> {
        if self.status.is_resolved() {
            Ok(())
        } else {
            Err(self.invalid_state("a resolved URL"))
        }
    }

    fn require_downloaded(&self) -> Result<&DownloadedFile> {
        match (&self.status, &self.downloaded) {
            (ArtefactStatus::Downloaded, Some(file)) => Ok(file),
            _ => Err(self.invalid_state(ArtefactStatus::Downloaded.as_str())),
        }
    }

    /// Run the resolver's setup and resolution
    pub fn resolve(&mut self, transport: &dyn Transport) -> Result<()> {
        if self.status != ArtefactStatus::Initialised {
            return Err(self.invalid_state(ArtefactStatus::Initialised.as_str()));
        }

        debug!("Resolving {} from {} source", self.label(), self.kind());

        let outcome = self
            .resolver
            .setup()
            .and_then(|_| self.resolver.resolve(transport));

        match outcome {
            Ok(resolution) => {
                info!(
                    "Resolved {} to {} (version {})",
                    self.label(),
                    resolution.url,
                    resolution.version.as_deref().unwrap_or("unknown")
                );
                self.download_url = Some(resolution.url);
                self.version = resolution.version;
                self.transition(ArtefactStatus::ReadyToDownload)
            }
            Err(e) => {
                self.transition(ArtefactStatus::ResolutionError)?;
                Err(match e {
                    Error::ConfigError(msg) => Error::ConfigError(format!("{}: {}", self.label(), msg)),
                    other => Error::ResolutionError(format!("{}: {}", self.label(), other)),
                })
            }
        }
    }

    pub fn url(&self) -> Result<&str> {
        self.require_resolved()?;
        self.download_url
            .as_deref()
            .ok_or_else(|| self.invalid_state("a resolved URL"))
    }

    /// Resolved version; `None` when the source did not reveal one
    pub fn version(&self) -> Result<Option<&str>> {
        self.require_resolved()?;
        Ok(self.version.as_deref())
    }

    /// Probe whether the resolved URL answers
    pub fn url_exists(&self, transport: &dyn Transport) -> Result<bool> {
        Ok(transport.probe(self.url()?))
    }

    /// Download into the platform's working directory
    pub fn download(&mut self, transport: &dyn Transport) -> Result<&DownloadedFile> {
        if self.status != ArtefactStatus::ReadyToDownload {
            return Err(self.invalid_state(ArtefactStatus::ReadyToDownload.as_str()));
        }

        let url = self.url()?.to_string();
        let file = download_to_dir(transport, &url, &self.platform.working_directory)
            .map_err(|e| match e {
                Error::DownloadError(msg) => Error::DownloadError(format!("{}: {}", self.label(), msg)),
                other => other,
            })?;

        self.downloaded = Some(file);
        self.transition(ArtefactStatus::Downloaded)?;
        self.require_downloaded()
    }

    pub fn downloaded_path(&self) -> Result<&Path> {
        Ok(&self.require_downloaded()?.path)
    }

    /// SHA-256 of the downloaded content
    pub fn hash(&self) -> Result<&str> {
        Ok(&self.require_downloaded()?.sha256)
    }

    /// Whether the downloaded file is an archive the tool can open
    pub fn is_archive(&self, tool: &dyn ArchiveTool) -> Result<bool> {
        let path = self.downloaded_path()?;
        if skips_archive_check(path) {
            return Ok(false);
        }
        Ok(tool.test(path))
    }

    /// Extract the downloaded archive next to it; returns false if it is not an archive
    pub fn extract_archive(&self, tool: &dyn ArchiveTool) -> Result<bool> {
        if !self.is_archive(tool)? {
            return Ok(false);
        }

        let path = self.downloaded_path()?;
        let dest_dir = path.parent().unwrap_or(self.platform.working_directory.as_path());
        tool.extract(path, dest_dir)?;
        Ok(true)
    }
}

impl fmt::Debug for Artefact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artefact")
            .field("label", &self.label())
            .field("identifier", &self.identifier)
            .field("kind", &self.kind())
            .field("status", &self.status)
            .field("download_url", &self.download_url)
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DirectSource, GithubSource, SourceConfig};
    use crate::http::mock::MockTransport;
    use std::cell::RefCell;
    use std::path::PathBuf;

    struct RecordingTool {
        valid: bool,
        extracted: RefCell<Vec<(PathBuf, PathBuf)>>,
    }

    impl ArchiveTool for RecordingTool {
        fn test(&self, _path: &Path) -> bool {
            self.valid
        }

        fn extract(&self, path: &Path, dest_dir: &Path) -> Result<()> {
            self.extracted
                .borrow_mut()
                .push((path.to_path_buf(), dest_dir.to_path_buf()));
            Ok(())
        }
    }

    fn platform(dir: &Path) -> Arc<PlatformConfig> {
        Arc::new(PlatformConfig::new("windows", dir, &["x64"]))
    }

    fn direct(url: &str) -> ArtefactConfig {
        ArtefactConfig {
            name: "tool".to_string(),
            architecture: "x64".to_string(),
            source: SourceConfig::Direct(DirectSource {
                url: url.to_string(),
                version: Some("1.2.3".to_string()),
            }),
        }
    }

    #[test]
    fn test_unknown_architecture_is_config_error() {
        let mut config = direct("https://x/a.zip");
        config.architecture = "sparc".to_string();

        let result = Artefact::new(platform(Path::new("/srv/w")), config);
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_identifier_uses_platform_directory() {
        let artefact = Artefact::new(platform(Path::new("/srv/w")), direct("https://x/a.zip")).unwrap();
        assert_eq!(artefact.identifier(), &identify("/srv/w", "tool", "x64"));
        assert_eq!(artefact.label(), "windows/tool/x64");
    }

    #[test]
    fn test_guards_before_resolution() {
        let artefact = Artefact::new(platform(Path::new("/srv/w")), direct("https://x/a.zip")).unwrap();
        let transport = MockTransport::new();

        assert_eq!(artefact.status(), ArtefactStatus::Initialised);
        assert!(matches!(artefact.url(), Err(Error::InvalidState { .. })));
        assert!(matches!(artefact.version(), Err(Error::InvalidState { .. })));
        assert!(matches!(artefact.url_exists(&transport), Err(Error::InvalidState { .. })));
        assert!(matches!(artefact.hash(), Err(Error::InvalidState { .. })));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_guards_before_download() {
        let dir = tempfile::tempdir().unwrap();
        let mut artefact = Artefact::new(platform(dir.path()), direct("https://x/a.zip")).unwrap();
        let tool = RecordingTool { valid: true, extracted: RefCell::new(Vec::new()) };

        artefact.resolve(&MockTransport::new()).unwrap();

        assert_eq!(artefact.status(), ArtefactStatus::ReadyToDownload);
        assert_eq!(artefact.url().unwrap(), "https://x/a.zip");
        assert_eq!(artefact.version().unwrap(), Some("1.2.3"));
        assert!(matches!(artefact.hash(), Err(Error::InvalidState { .. })));
        assert!(matches!(artefact.downloaded_path(), Err(Error::InvalidState { .. })));
        assert!(matches!(artefact.is_archive(&tool), Err(Error::InvalidState { .. })));
        assert!(matches!(artefact.extract_archive(&tool), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn test_resolution_failure_is_terminal() {
        let config = ArtefactConfig {
            name: "tool".to_string(),
            architecture: "x64".to_string(),
            source: SourceConfig::Github(GithubSource {
                owner: "acme".to_string(),
                repository: "tool".to_string(),
                tag: None,
                regex: r"\.zip$".to_string(),
            }),
        };
        let mut artefact = Artefact::new(platform(Path::new("/srv/w")), config).unwrap();
        let transport = MockTransport::new();

        let result = artefact.resolve(&transport);

        match result {
            Err(Error::ResolutionError(msg)) => assert!(msg.starts_with("windows/tool/x64")),
            other => panic!("expected resolution error, got {:?}", other),
        }
        assert_eq!(artefact.status(), ArtefactStatus::ResolutionError);
        assert!(matches!(artefact.url(), Err(Error::InvalidState { .. })));
        assert!(matches!(artefact.resolve(&transport), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn test_download_then_archive_operations() {
        let dir = tempfile::tempdir().unwrap();
        let platform = platform(dir.path());
        std::fs::create_dir_all(&platform.working_directory).unwrap();

        let transport = MockTransport::new().with_file("https://x/a.zip", b"zip bytes");
        let tool = RecordingTool { valid: true, extracted: RefCell::new(Vec::new()) };

        let mut artefact = Artefact::new(platform.clone(), direct("https://x/a.zip")).unwrap();
        artefact.resolve(&transport).unwrap();
        artefact.download(&transport).unwrap();

        assert_eq!(artefact.status(), ArtefactStatus::Downloaded);
        assert_eq!(artefact.downloaded_path().unwrap(), platform.working_directory.join("a.zip"));
        assert_eq!(artefact.hash().unwrap().len(), 64);
        assert!(artefact.is_archive(&tool).unwrap());
        assert!(artefact.extract_archive(&tool).unwrap());

        let extracted = tool.extracted.borrow();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].1, platform.working_directory);

        // A second download is not a valid transition
        assert!(matches!(artefact.download(&transport), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn test_exe_skips_archive_probe() {
        let dir = tempfile::tempdir().unwrap();
        let platform = platform(dir.path());
        std::fs::create_dir_all(&platform.working_directory).unwrap();

        let transport = MockTransport::new().with_file("https://x/setup.exe", b"MZ");
        let tool = RecordingTool { valid: true, extracted: RefCell::new(Vec::new()) };

        let mut artefact = Artefact::new(platform, direct("https://x/setup.exe")).unwrap();
        artefact.resolve(&transport).unwrap();
        artefact.download(&transport).unwrap();

        assert!(!artefact.is_archive(&tool).unwrap());
        assert!(!artefact.extract_archive(&tool).unwrap());
        assert!(tool.extracted.borrow().is_empty());
    }

    #[test]
    fn test_transition_table() {
        use ArtefactStatus::*;
        assert!(Initialised.can_transition_to(ReadyToDownload));
        assert!(Initialised.can_transition_to(ResolutionError));
        assert!(ReadyToDownload.can_transition_to(Downloaded));
        assert!(!Initialised.can_transition_to(Downloaded));
        assert!(!ResolutionError.can_transition_to(ReadyToDownload));
        assert!(!Downloaded.can_transition_to(ReadyToDownload));
    }
}
