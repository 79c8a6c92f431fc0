// src/resolver/sourceforge.rs

//! File from a SourceForge project folder
//!
//! When the configured version is "latest" the project's file listing is
//! scraped for the newest version first. A miss there only leaves the
//! version unknown. The download link then comes from the folder's RSS
//! feed: the first entry whose link matches the filename pattern, with
//! the trailing `/download` removed.

use super::{compile_pattern, first_capture, not_set_up, parse_selector, select_text, Resolution, Resolver};
use crate::config::{is_latest, SourceKind, SourceforgeSource};
use crate::error::{Error, Result};
use crate::http::Transport;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use scraper::Selector;
use tracing::{debug, warn};

const SOURCEFORGE: &str = "https://sourceforge.net/projects";

/// Suffix SourceForge appends to file links in its feeds
const DOWNLOAD_SUFFIX: &str = "/download";

/// Stand-in for the version when discovery found nothing
const ANY_VERSION: &str = "[^/]+";

struct Prepared {
    listing_url: String,
    feed_url: String,
    version_finder: Option<(Selector, Regex)>,
}

pub struct SourceforgeResolver {
    source: SourceforgeSource,
    prepared: Option<Prepared>,
}

impl SourceforgeResolver {
    pub fn new(source: SourceforgeSource) -> Self {
        Self {
            source,
            prepared: None,
        }
    }

    /// Scrape the project's file listing for the newest version
    fn discover_version(&self, prepared: &Prepared, transport: &dyn Transport) -> Option<String> {
        let (selector, pattern) = match &prepared.version_finder {
            Some(finder) => finder,
            None => {
                warn!("No version finder configured for {}", self.source.project);
                return None;
            }
        };

        let listing = match transport.get_text(&prepared.listing_url) {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Version not found for {}: {}", self.source.project, e);
                return None;
            }
        };

        let version = select_text(&listing, selector).and_then(|text| first_capture(pattern, &text));
        if version.is_none() {
            warn!("Version not found on {}", prepared.listing_url);
        }
        version
    }
}

/// Pattern matching feed links for the configured filename
fn filename_pattern(template: &str, version: Option<&str>) -> Result<Regex> {
    let version = match version {
        Some(v) => regex::escape(v),
        None => ANY_VERSION.to_string(),
    };
    let filename = template.replace("{version}", &version);
    compile_pattern(&format!("^.*{}{}", filename, DOWNLOAD_SUFFIX))
}

fn href_attribute(element: &BytesStart) -> Option<String> {
    element
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == b"href")
        .map(|a| String::from_utf8_lossy(&a.value).trim().to_string())
}

/// Entry links of an RSS or Atom feed, in feed order
fn parse_feed_links(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut links = Vec::new();
    let mut in_entry = false;
    let mut in_link = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_entry = true,
                b"link" if in_entry => match href_attribute(&e) {
                    Some(href) => links.push(href),
                    None => in_link = true,
                },
                _ => {}
            },
            Ok(Event::Empty(e)) if in_entry && e.local_name().as_ref() == b"link" => {
                if let Some(href) = href_attribute(&e) {
                    links.push(href);
                }
            }
            Ok(Event::Text(e)) if in_link => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::ParseError(format!("Bad text in feed: {}", e)))?;
                links.push(text.trim().to_string());
            }
            Ok(Event::CData(e)) if in_link => {
                links.push(String::from_utf8_lossy(&e.into_inner()).trim().to_string());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_entry = false,
                b"link" => in_link = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::ParseError(format!("Failed to parse feed: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(links)
}

impl Resolver for SourceforgeResolver {
    fn kind(&self) -> SourceKind {
        SourceKind::Sourceforge
    }

    fn setup(&mut self) -> Result<()> {
        let version_finder = match &self.source.version_finder {
            Some(finder) => Some((parse_selector(&finder.selector)?, compile_pattern(&finder.regex)?)),
            None => None,
        };

        self.prepared = Some(Prepared {
            listing_url: format!("{}/{}/files/{}/", SOURCEFORGE, self.source.project, self.source.folder),
            feed_url: format!("{}/{}/rss?path=/{}", SOURCEFORGE, self.source.project, self.source.folder),
            version_finder,
        });
        Ok(())
    }

    fn resolve(&mut self, transport: &dyn Transport) -> Result<Resolution> {
        let prepared = self
            .prepared
            .as_ref()
            .ok_or_else(|| not_set_up(SourceKind::Sourceforge))?;

        let version = if is_latest(self.source.version.as_deref()) {
            self.discover_version(prepared, transport)
        } else {
            self.source.version.clone()
        };

        let pattern = filename_pattern(&self.source.filename_regex, version.as_deref())?;
        let feed = transport.get_text(&prepared.feed_url)?;
        let links = parse_feed_links(&feed)?;
        debug!("Feed {} lists {} files", prepared.feed_url, links.len());

        let url = links
            .iter()
            .find(|link| pattern.is_match(link))
            .map(|link| link.strip_suffix(DOWNLOAD_SUFFIX).unwrap_or(link).to_string())
            .ok_or_else(|| {
                Error::ResolutionError(format!(
                    "No file in {} matches '{}'",
                    prepared.feed_url,
                    pattern.as_str()
                ))
            })?;

        Ok(Resolution { url, version })
    }
}
