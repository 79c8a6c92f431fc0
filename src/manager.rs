// src/manager.rs

//! Two-phase run orchestration
//!
//! Phase 1 builds every configured artefact, rejects duplicate identities,
//! resolves each source and probes the resolved URL. Any failure aborts
//! the whole run before anything is downloaded.
//!
//! Phase 2 (skipped for dry runs) downloads each artefact in configuration
//! order, records its hash in the run-state, extracts archives in place
//! and finally saves the pruned run-state.

use crate::archive::ArchiveTool;
use crate::artefact::Artefact;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::Transport;
use crate::identity::Identifier;
use crate::state::{Change, HashUpdate, RunState};
use std::collections::HashSet;
use std::fs;
use tracing::{error, info};

/// An artefact that passed phase 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtefact {
    pub label: String,
    pub url: String,
    pub version: Option<String>,
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub dry_run: bool,
    pub resolved: Vec<ResolvedArtefact>,
    pub downloaded: usize,
    pub extracted: usize,
    pub changes: Vec<Change>,
    /// Artefacts whose download or extraction failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl RunReport {
    /// Console lines for this report
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if self.dry_run {
            for artefact in &self.resolved {
                lines.push(format!(
                    "READY: {} {} {}",
                    artefact.label,
                    artefact.version.as_deref().unwrap_or("-"),
                    artefact.url
                ));
            }
            return lines;
        }

        for (label, reason) in &self.failed {
            lines.push(format!("FAILED: {} ({})", label, reason));
        }

        if self.changes.is_empty() {
            lines.push("No changes.".to_string());
        } else {
            for change in &self.changes {
                lines.push(format!(
                    "CHANGE: {}/{}/{}",
                    change.platform, change.name, change.architecture
                ));
            }
        }

        lines
    }
}

/// Drives one run over a configuration
pub struct DownloadManager<'a> {
    config: &'a Config,
    transport: &'a dyn Transport,
    archiver: &'a dyn ArchiveTool,
    dry_run: bool,
}

impl<'a> DownloadManager<'a> {
    pub fn new(config: &'a Config, transport: &'a dyn Transport, archiver: &'a dyn ArchiveTool) -> Self {
        Self {
            config,
            transport,
            archiver,
            dry_run: false,
        }
    }

    /// Resolve and probe only; nothing is downloaded or written
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run both phases
    pub fn run(&self) -> Result<RunReport> {
        let mut artefacts = self.prepare()?;

        let mut report = RunReport {
            dry_run: self.dry_run,
            resolved: artefacts.iter().map(resolved_summary).collect::<Result<Vec<_>>>()?,
            ..RunReport::default()
        };

        if self.dry_run {
            info!("Dry run: {} artefacts resolved, nothing downloaded", artefacts.len());
            return Ok(report);
        }

        let mut state = RunState::load(&self.config.state_file);
        self.download_all(&mut artefacts, &mut state, &mut report)?;

        let current: HashSet<Identifier> = artefacts.iter().map(|a| a.identifier().clone()).collect();
        state.save(&current, &self.config.state_file)?;

        report.changes = state.changes.into_values().collect();
        Ok(report)
    }

    /// Phase 1: build, de-duplicate, resolve and probe every artefact
    pub fn prepare(&self) -> Result<Vec<Artefact>> {
        let mut artefacts = Vec::new();
        let mut seen: HashSet<Identifier> = HashSet::new();

        for platform in self.config.platforms() {
            for artefact_config in self.config.artefacts_for(&platform.name) {
                let mut artefact = Artefact::new(platform.clone(), artefact_config.clone())?;

                if !seen.insert(artefact.identifier().clone()) {
                    return Err(Error::DuplicateArtefact(artefact.label()));
                }

                artefact.resolve(self.transport)?;

                if !artefact.url_exists(self.transport)? {
                    return Err(Error::UnreachableError(format!(
                        "{} ({})",
                        artefact.label(),
                        artefact.url()?
                    )));
                }

                artefacts.push(artefact);
            }
        }

        info!("Resolved {} artefacts", artefacts.len());
        Ok(artefacts)
    }

    /// Phase 2: download, record and extract each artefact
    fn download_all(&self, artefacts: &mut [Artefact], state: &mut RunState, report: &mut RunReport) -> Result<()> {
        for platform in self.config.platforms() {
            fs::create_dir_all(&platform.working_directory).map_err(|e| {
                Error::IoError(format!(
                    "Failed to create working directory {}: {}",
                    platform.working_directory.display(),
                    e
                ))
            })?;
        }

        for artefact in artefacts.iter_mut() {
            match self.process(artefact, state) {
                Ok(extracted) => {
                    report.downloaded += 1;
                    if extracted {
                        report.extracted += 1;
                    }
                }
                Err(e) => {
                    error!("{}: {}", artefact.label(), e);
                    report.failed.push((artefact.label(), e.to_string()));
                }
            }
        }

        Ok(())
    }

    fn process(&self, artefact: &mut Artefact, state: &mut RunState) -> Result<bool> {
        artefact.download(self.transport)?;

        if state.diff_and_update(artefact)? == HashUpdate::Changed {
            info!("{} changed", artefact.label());
        }

        artefact.extract_archive(self.archiver)
    }
}

fn resolved_summary(artefact: &Artefact) -> Result<ResolvedArtefact> {
    Ok(ResolvedArtefact {
        label: artefact.label(),
        url: artefact.url()?.to_string(),
        version: artefact.version()?.map(str::to_string),
    })
}
