// src/resolver/direct.rs

//! Fixed URL and version taken straight from the configuration

use super::{not_set_up, Resolution, Resolver};
use crate::config::{DirectSource, SourceKind};
use crate::error::Result;
use crate::http::Transport;

pub struct DirectResolver {
    source: DirectSource,
    resolution: Option<Resolution>,
}

impl DirectResolver {
    pub fn new(source: DirectSource) -> Self {
        Self {
            source,
            resolution: None,
        }
    }
}

impl Resolver for DirectResolver {
    fn kind(&self) -> SourceKind {
        SourceKind::Direct
    }

    fn setup(&mut self) -> Result<()> {
        self.resolution = Some(Resolution {
            url: self.source.url.clone(),
            version: self.source.version.clone(),
        });
        Ok(())
    }

    fn resolve(&mut self, _transport: &dyn Transport) -> Result<Resolution> {
        self.resolution
            .clone()
            .ok_or_else(|| not_set_up(SourceKind::Direct))
    }
}
