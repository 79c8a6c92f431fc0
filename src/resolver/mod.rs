// src/resolver/mod.rs

//! Source resolvers
//!
//! Each source kind turns its descriptor into a download URL and, when it
//! can, a version string:
//! - `direct`: fixed URL and version, no network access
//! - `webpage`: first link matching a CSS selector on a page
//! - `github`: first release asset matching a pattern
//! - `sourceforge`: first project feed entry matching a filename pattern
//!
//! All resolvers share one protocol: construct, `setup()` (local
//! preparation only), then `resolve()` (network access). A URL that cannot
//! be found is an error; a version that cannot be found is not.

pub mod direct;
pub mod github;
pub mod sourceforge;
pub mod webpage;

use crate::config::{SourceConfig, SourceKind};
use crate::error::{Error, Result};
use crate::http::Transport;
use regex::Regex;
use scraper::{Html, Selector};

pub use direct::DirectResolver;
pub use github::GithubResolver;
pub use sourceforge::SourceforgeResolver;
pub use webpage::WebpageResolver;

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub url: String,
    pub version: Option<String>,
}

/// Common interface for all source kinds
pub trait Resolver {
    /// Source kind this resolver handles
    fn kind(&self) -> SourceKind;

    /// Prepare everything that does not need the network
    fn setup(&mut self) -> Result<()>;

    /// Find the download URL and version
    fn resolve(&mut self, transport: &dyn Transport) -> Result<Resolution>;
}

/// Build the resolver for a source descriptor
pub fn for_source(source: &SourceConfig) -> Box<dyn Resolver> {
    match source {
        SourceConfig::Direct(src) => Box::new(DirectResolver::new(src.clone())),
        SourceConfig::Webpage(src) => Box::new(WebpageResolver::new(src.clone())),
        SourceConfig::Github(src) => Box::new(GithubResolver::new(src.clone())),
        SourceConfig::Sourceforge(src) => Box::new(SourceforgeResolver::new(src.clone())),
    }
}

/// Compile a configured pattern
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::ConfigError(format!("Invalid pattern '{}': {}", pattern, e)))
}

/// Parse a configured CSS selector
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| Error::ConfigError(format!("Invalid selector '{}': {:?}", selector, e)))
}

/// First capture group of the first match, if any
pub(crate) fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Attribute of the first element matching a selector
///
/// Returns `Ok(None)` when nothing matches and an error when the element
/// exists but lacks the attribute.
pub(crate) fn select_attribute(html: &str, selector: &Selector, attribute: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let Some(element) = document.select(selector).next() else {
        return Ok(None);
    };

    element
        .value()
        .attr(attribute)
        .map(|value| Some(value.trim().to_string()))
        .ok_or_else(|| {
            Error::ResolutionError(format!("Selected element has no '{}' attribute", attribute))
        })
}

/// Text content of the first element matching a selector
pub(crate) fn select_text(html: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .next()
        .map(|element| element.text().collect::<String>())
}

fn not_set_up(kind: SourceKind) -> Error {
    Error::ResolutionError(format!("{} resolver used before setup", kind))
}
