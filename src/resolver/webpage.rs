// src/resolver/webpage.rs

//! Download link scraped from a web page
//!
//! The first element matching the selector provides a (possibly relative)
//! link in the configured attribute. The version is the first capture
//! group of the version pattern applied to the absolute link.

use super::{compile_pattern, first_capture, not_set_up, parse_selector, select_attribute, Resolution, Resolver};
use crate::config::{SourceKind, WebpageSource};
use crate::error::{Error, Result};
use crate::http::Transport;
use regex::Regex;
use reqwest::Url;
use scraper::Selector;
use tracing::{debug, warn};

pub struct WebpageResolver {
    source: WebpageSource,
    prepared: Option<(Selector, Regex)>,
}

impl WebpageResolver {
    pub fn new(source: WebpageSource) -> Self {
        Self {
            source,
            prepared: None,
        }
    }
}

impl Resolver for WebpageResolver {
    fn kind(&self) -> SourceKind {
        SourceKind::Webpage
    }

    fn setup(&mut self) -> Result<()> {
        let selector = parse_selector(&self.source.selector)?;
        let version_regex = compile_pattern(&self.source.version_regex)?;
        self.prepared = Some((selector, version_regex));
        Ok(())
    }

    fn resolve(&mut self, transport: &dyn Transport) -> Result<Resolution> {
        let (selector, version_regex) = self
            .prepared
            .as_ref()
            .ok_or_else(|| not_set_up(SourceKind::Webpage))?;

        let page = transport.get_text(&self.source.url)?;

        let link = select_attribute(&page, selector, &self.source.attribute)?.ok_or_else(|| {
            Error::ResolutionError(format!(
                "No element matches '{}' on {}",
                self.source.selector, self.source.url
            ))
        })?;

        let url = Url::parse(&self.source.url)
            .and_then(|base| base.join(&link))
            .map_err(|e| {
                Error::ResolutionError(format!("Cannot build a URL from '{}': {}", link, e))
            })?
            .to_string();

        let version = first_capture(version_regex, &url);
        match &version {
            Some(v) => debug!("Found {} (version {})", url, v),
            None => warn!("Found {} but no version matches '{}'", url, self.source.version_regex),
        }

        Ok(Resolution { url, version })
    }
}
