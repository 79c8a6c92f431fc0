// src/archive.rs

//! External archive tool
//!
//! Archive testing and extraction is delegated to 7-Zip run as a
//! subprocess. Exit code 0 means a valid archive for `t` and a successful
//! extraction for `x`.

use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Extensions that are never probed as archives
///
/// 7-Zip opens many self-extracting installers, which must stay intact.
pub const SKIP_ARCHIVE_CHECKS: &[&str] = &["exe"];

/// Archive validity check and extraction
pub trait ArchiveTool {
    /// True if the file is an archive the tool can read
    fn test(&self, path: &Path) -> bool;

    /// Extract the archive into a directory
    fn extract(&self, path: &Path, dest_dir: &Path) -> Result<()>;
}

/// True if a file's extension excludes it from the archive probe
pub fn skips_archive_check(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SKIP_ARCHIVE_CHECKS
                .iter()
                .any(|skip| ext.eq_ignore_ascii_case(skip))
        })
        .unwrap_or(false)
}

/// 7-Zip command line tool
#[derive(Debug, Clone)]
pub struct SevenZip {
    executable: PathBuf,
}

impl SevenZip {
    /// Find the archive tool on `PATH`
    pub fn locate(program: &str) -> Result<Self> {
        let executable = which::which(program).map_err(|e| {
            Error::DependencyMissing(format!("{} not found: {}", program, e))
        })?;
        debug!("Using archive tool at {}", executable.display());
        Ok(Self { executable })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn run(&self, args: &[&OsStr]) -> Result<bool> {
        let status = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                Error::IoError(format!("Failed to run {}: {}", self.executable.display(), e))
            })?;
        Ok(status.success())
    }
}

impl ArchiveTool for SevenZip {
    fn test(&self, path: &Path) -> bool {
        match self.run(&[OsStr::new("t"), path.as_os_str()]) {
            Ok(valid) => valid,
            Err(e) => {
                debug!("Archive test of {} failed: {}", path.display(), e);
                false
            }
        }
    }

    fn extract(&self, path: &Path, dest_dir: &Path) -> Result<()> {
        info!("Extracting {} into {}", path.display(), dest_dir.display());

        let mut output_arg = OsString::from("-o");
        output_arg.push(dest_dir.as_os_str());

        if self.run(&[
            OsStr::new("x"),
            path.as_os_str(),
            output_arg.as_os_str(),
            OsStr::new("-y"),
        ])? {
            Ok(())
        } else {
            Err(Error::IoError(format!(
                "{} could not extract {}",
                self.executable.display(),
                path.display()
            )))
        }
    }
}
