//! bakehouse: incremental static site baker with a live preview server
//!
//! The baker walks a site root and runs each file through the processor
//! pipeline when its outputs are stale. The preview server serves the baked
//! files with conditional GET, and renders blog index pages and content
//! pages on demand through the render cache.

pub mod baker;
pub mod cache;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod helpers;
pub mod pagination;
pub mod server;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// A site on disk and its configuration
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Site root, also the bake input
    pub root_dir: PathBuf,
    /// Bake output directory
    pub bake_dir: PathBuf,
    /// Render cache directory
    pub cache_dir: PathBuf,
}

impl Site {
    /// Open the site at `root_dir`, reading `_config.yml` when present
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        let config_path = root_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        let bake_dir = root_dir.join(&config.baker.output_dir);
        let cache_dir = root_dir.join(&config.server.cache_dir);

        Ok(Self {
            config,
            root_dir,
            bake_dir,
            cache_dir,
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.root_dir.join("_config.yml")
    }

    pub fn posts_dir(&self) -> PathBuf {
        self.root_dir.join(&self.config.site.posts_dir)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root_dir.join(&self.config.site.pages_dir)
    }

    pub fn mime_types_path(&self) -> PathBuf {
        self.root_dir.join(&self.config.server.mime_types)
    }

    /// Bake the site, returning the relative paths that were (re)written
    pub fn bake(&self, full: bool) -> Result<Vec<String>> {
        commands::bake::run(self, full)
    }

    /// Remove the bake output and the render cache
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_site_defaults() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        assert_eq!(site.bake_dir, dir.path().join("_counter"));
        assert_eq!(site.cache_dir, dir.path().join("_cache"));
        assert_eq!(site.posts_dir(), dir.path().join("_content/posts"));
        assert_eq!(site.mime_types_path(), dir.path().join("mime.types"));
    }

    #[test]
    fn test_site_reads_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("_config.yml"),
            "baker:\n  output_dir: _site\nserver:\n  cache_dir: .cache\n",
        )
        .unwrap();
        let site = Site::new(dir.path()).unwrap();
        assert_eq!(site.bake_dir, dir.path().join("_site"));
        assert_eq!(site.cache_dir, dir.path().join(".cache"));
    }
}
