//! Render cache for the preview server
//!
//! Rendered pages are stored under `<cache_dir>/<uri>.<extension>`. Each file
//! starts with a one-line comment recording who wrote it and when, using the
//! comment syntax of the file's own type, so cached files stay valid documents.

use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Comment delimiters for the cache header, by extension
fn comment_tags(extension: &str) -> Option<(&'static str, &'static str)> {
    match extension {
        "html" | "htm" | "xml" | "atom" | "rss" => Some(("<!-- ", " -->")),
        "yml" | "yaml" | "toml" | "sh" | "py" => Some(("# ", "")),
        "css" | "js" => Some(("/* ", " */")),
        _ => None,
    }
}

/// On-disk cache of rendered output, keyed by URI and extension
#[derive(Debug, Clone)]
pub struct RenderCache {
    base_dir: PathBuf,
}

impl RenderCache {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// True when there is no cached file, or it is older than the source
    pub fn is_expired(&self, source: &Path, uri: &str, extension: Option<&str>) -> io::Result<bool> {
        let cache_path = self.cache_path(uri, extension)?;
        let cached = match fs::metadata(&cache_path) {
            Ok(metadata) => metadata.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e),
        };
        let source_time = fs::metadata(source)?.modified()?;
        Ok(cached < source_time)
    }

    /// Cached file contents, header line included
    pub fn read(&self, uri: &str, extension: Option<&str>) -> io::Result<String> {
        fs::read_to_string(self.cache_path(uri, extension)?)
    }

    /// Cached payload without the header line
    pub fn read_payload(&self, uri: &str, extension: Option<&str>) -> io::Result<String> {
        let contents = self.read(uri, extension)?;
        if extension.and_then(comment_tags).is_none() {
            return Ok(contents);
        }
        Ok(match contents.split_once('\n') {
            Some((_, payload)) => payload.to_string(),
            None => String::new(),
        })
    }

    /// Write `contents` behind a generated comment header. Extensions without
    /// a known comment syntax are written without a header.
    pub fn write(&self, uri: &str, extension: Option<&str>, contents: &str) -> io::Result<()> {
        let cache_path = self.cache_path(uri, extension)?;
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let output = match extension.and_then(comment_tags) {
            Some((open, close)) => format!(
                "{}Bakehouse {} - cached {}{}\n{}",
                open,
                env!("CARGO_PKG_VERSION"),
                Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
                close,
                contents
            ),
            None => contents.to_string(),
        };
        fs::write(&cache_path, output)?;
        tracing::debug!("Cached {:?}", cache_path);
        Ok(())
    }

    /// Remove every cached file
    pub fn clear(&self) -> io::Result<()> {
        if self.base_dir.exists() {
            fs::remove_dir_all(&self.base_dir)?;
            tracing::info!("Deleted: {:?}", self.base_dir);
        }
        Ok(())
    }

    /// Cache file for a URI. URIs with `..` segments would leave the cache
    /// directory and are rejected.
    fn cache_path(&self, uri: &str, extension: Option<&str>) -> io::Result<PathBuf> {
        if uri.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Cache key escapes the cache directory: {}", uri),
            ));
        }
        let uri = uri.trim_start_matches(['/', '\\']);
        let uri = if uri.is_empty() { "index" } else { uri };
        Ok(match extension {
            Some(ext) => self.base_dir.join(format!("{}.{}", uri, ext)),
            None => self.base_dir.join(uri),
        })
    }
}
