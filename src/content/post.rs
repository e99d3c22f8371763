//! Post descriptors and lazily loaded content items

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use super::{FrontMatter, MarkdownRenderer};
use crate::error::ContentError;

lazy_static! {
    /// `YYYY-MM-DD_slug.ext`
    static ref POST_FILE: Regex =
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})_(.+)\.[^.]+$").unwrap();
}

/// One entry of an ordered post collection, derived from the file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostInfo {
    pub path: PathBuf,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub slug: String,
}

impl PostInfo {
    /// Parse a post file name. Returns `None` for files that don't follow the
    /// `YYYY-MM-DD_slug.ext` convention or carry an impossible date.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let name = path.file_name()?.to_str()?;
        let caps = POST_FILE.captures(name)?;

        let info = Self {
            path: path.to_path_buf(),
            year: caps[1].parse().ok()?,
            month: caps[2].parse().ok()?,
            day: caps[3].parse().ok()?,
            slug: caps[4].to_string(),
        };
        info.date()?;
        Some(info)
    }

    /// Calendar date encoded in the file name
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

/// The parts of a content file that require reading it
#[derive(Debug, Clone)]
pub struct LoadedContent {
    pub config: FrontMatter,
    /// Full rendered body
    pub content: String,
    /// Rendered body up to the `<!--more-->` marker, when present
    pub abstract_content: Option<String>,
}

/// Identity-stable representation of one content file.
///
/// Items are created through a `ContentRepository` so that every view over
/// the same file shares one instance and loads it at most once.
#[derive(Debug)]
pub struct ContentItem {
    path: PathBuf,
    uri: String,
    date: NaiveDate,
    loaded: OnceCell<LoadedContent>,
}

impl ContentItem {
    pub fn new(path: PathBuf, uri: String, date: NaiveDate) -> Self {
        Self {
            path,
            uri,
            date,
            loaded: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Date derived from the file path
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Read and render the file on first use
    pub fn load(&self) -> Result<&LoadedContent, ContentError> {
        if let Some(loaded) = self.loaded.get() {
            return Ok(loaded);
        }

        let source = fs::read_to_string(&self.path).map_err(|source| ContentError::Read {
            path: self.path.clone(),
            source,
        })?;
        let (config, body) =
            FrontMatter::parse(&source).map_err(|source| ContentError::FrontMatter {
                path: self.path.clone(),
                source,
            })?;

        let renderer = MarkdownRenderer::new();
        let (abstract_body, full_body) = MarkdownRenderer::split_abstract(body);
        let loaded = LoadedContent {
            config,
            content: renderer.render(&full_body),
            abstract_content: abstract_body.map(|a| renderer.render(&a)),
        };
        tracing::debug!("Loaded content item {:?}", self.path);

        Ok(self.loaded.get_or_init(|| loaded))
    }
}
