// src/resolver/github.rs

//! Asset of a GitHub release
//!
//! Uses the REST API: `/releases/tags/{tag}` for a concrete tag, otherwise
//! `/releases/latest`. Assets are scanned in the order the API returns
//! them and the first download URL matching the pattern wins; its first
//! capture group is the version.

use super::{compile_pattern, first_capture, not_set_up, Resolution, Resolver};
use crate::config::{is_latest, GithubSource, SourceKind};
use crate::error::{Error, Result};
use crate::http::Transport;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: Option<String>,
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    browser_download_url: String,
}

pub struct GithubResolver {
    source: GithubSource,
    prepared: Option<(String, Regex)>,
}

impl GithubResolver {
    pub fn new(source: GithubSource) -> Self {
        Self {
            source,
            prepared: None,
        }
    }

    /// Release endpoint for the configured tag
    pub fn api_url(&self) -> String {
        match self.source.tag.as_deref() {
            Some(tag) if !is_latest(Some(tag)) => format!(
                "{}/repos/{}/{}/releases/tags/{}",
                GITHUB_API, self.source.owner, self.source.repository, tag
            ),
            _ => format!(
                "{}/repos/{}/{}/releases/latest",
                GITHUB_API, self.source.owner, self.source.repository
            ),
        }
    }
}

/// First asset URL matching the pattern, with its version capture
fn select_asset<'a>(urls: impl IntoIterator<Item = &'a str>, pattern: &Regex) -> Option<(String, Option<String>)> {
    urls.into_iter()
        .find(|url| pattern.is_match(url))
        .map(|url| (url.to_string(), first_capture(pattern, url)))
}

impl Resolver for GithubResolver {
    fn kind(&self) -> SourceKind {
        SourceKind::Github
    }

    fn setup(&mut self) -> Result<()> {
        let pattern = compile_pattern(&self.source.regex)?;
        self.prepared = Some((self.api_url(), pattern));
        Ok(())
    }

    fn resolve(&mut self, transport: &dyn Transport) -> Result<Resolution> {
        let (api_url, pattern) = self
            .prepared
            .as_ref()
            .ok_or_else(|| not_set_up(SourceKind::Github))?;

        let body = transport.get_text(api_url)?;
        let release: Release = serde_json::from_str(&body).map_err(|e| {
            Error::ParseError(format!("Unexpected release document from {}: {}", api_url, e))
        })?;

        debug!(
            "Release {} of {}/{} has {} assets",
            release.tag_name.as_deref().unwrap_or("?"),
            self.source.owner,
            self.source.repository,
            release.assets.len()
        );

        let (url, version) = select_asset(
            release.assets.iter().map(|a| a.browser_download_url.as_str()),
            pattern,
        )
        .ok_or_else(|| {
            Error::ResolutionError(format!(
                "No asset of {}/{} matches '{}'",
                self.source.owner, self.source.repository, self.source.regex
            ))
        })?;

        if version.is_none() {
            warn!("Asset {} matched but the pattern captured no version", url);
        }

        Ok(Resolution { url, version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;

    fn source(tag: Option<&str>, regex: &str) -> GithubSource {
        GithubSource {
            owner: "acme".to_string(),
            repository: "tool".to_string(),
            tag: tag.map(str::to_string),
            regex: regex.to_string(),
        }
    }

    fn release(urls: &[&str]) -> String {
        let assets: Vec<_> = urls
            .iter()
            .map(|u| serde_json::json!({ "name": "x", "browser_download_url": u }))
            .collect();
        serde_json::json!({ "tag_name": "v2", "assets": assets }).to_string()
    }

    #[test]
    fn test_api_url_for_tag_and_latest() {
        let latest = GithubResolver::new(source(Some("latest"), "x"));
        assert_eq!(
            latest.api_url(),
            "https://api.github.com/repos/acme/tool/releases/latest"
        );

        let missing = GithubResolver::new(source(None, "x"));
        assert_eq!(missing.api_url(), latest.api_url());

        let tagged = GithubResolver::new(source(Some("v1.4.0"), "x"));
        assert_eq!(
            tagged.api_url(),
            "https://api.github.com/repos/acme/tool/releases/tags/v1.4.0"
        );
    }

    #[test]
    fn test_first_matching_asset_wins() {
        let api = "https://api.github.com/repos/acme/tool/releases/latest";
        let transport = MockTransport::new().with_page(
            api,
            &release(&[
                "https://github.com/acme/tool/releases/download/v2/file-2.0.0.tar",
                "https://github.com/acme/tool/releases/download/v1/file-1.0.0.zip",
                "https://github.com/acme/tool/releases/download/v1/file-1.5.0.zip",
            ]),
        );

        let mut resolver = GithubResolver::new(source(Some("latest"), r"file-(\d+\.\d+\.\d+)\.zip$"));
        resolver.setup().unwrap();
        let resolution = resolver.resolve(&transport).unwrap();

        assert_eq!(
            resolution.url,
            "https://github.com/acme/tool/releases/download/v1/file-1.0.0.zip"
        );
        assert_eq!(resolution.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_select_asset_preserves_order() {
        let pattern = compile_pattern(r"file-(\d+\.\d+\.\d+)\.zip$").unwrap();
        let selected = select_asset(["file-1.0.0.zip", "file-2.0.0.tar"], &pattern);
        assert_eq!(
            selected,
            Some(("file-1.0.0.zip".to_string(), Some("1.0.0".to_string())))
        );
    }

    #[test]
    fn test_no_matching_asset_is_an_error() {
        let api = "https://api.github.com/repos/acme/tool/releases/tags/v1";
        let transport = MockTransport::new().with_page(api, &release(&["https://x/readme.txt"]));

        let mut resolver = GithubResolver::new(source(Some("v1"), r"\.zip$"));
        resolver.setup().unwrap();
        let result = resolver.resolve(&transport);

        assert!(matches!(result, Err(Error::ResolutionError(_))));
    }

    #[test]
    fn test_malformed_release_document() {
        let api = "https://api.github.com/repos/acme/tool/releases/latest";
        let transport = MockTransport::new().with_page(api, r#"{"message": "Not Found"}"#);

        let mut resolver = GithubResolver::new(source(None, r"\.zip$"));
        resolver.setup().unwrap();
        assert!(matches!(resolver.resolve(&transport), Err(Error::ParseError(_))));
    }
}
