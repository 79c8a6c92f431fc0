// src/lib.rs

//! Artefact downloader
//!
//! Keeps a local mirror of installers, images and archives up to date for
//! a set of platforms and architectures.
//!
//! # Architecture
//!
//! - Resolvers: direct links, scraped web pages, GitHub releases and
//!   SourceForge feeds all resolve to a download URL and optional version
//! - Artefacts: a guarded lifecycle from resolution to download
//! - Run-state: SHA-256 per artefact identifier, diffed every run to
//!   report changes, pruned to what is still configured
//! - Fail fast: every source is resolved and probed before anything is
//!   downloaded

pub mod archive;
pub mod artefact;
pub mod config;
pub mod download;
mod error;
pub mod http;
pub mod identity;
pub mod manager;
pub mod resolver;
pub mod state;

pub use error::{Error, Result};
