//! Explicit rendering context handed to everything that needs site settings

use crate::config::SiteConfig;
use crate::helpers::{build_post_uri, url_for};

use super::PostInfo;

/// Site-wide settings used while projecting content for templates
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// URL prefix for every generated link
    pub root: String,
    /// Post URL format, e.g. `%year%/%month%/%day%/%slug%`
    pub post_url: String,
    /// strftime-style format for post dates
    pub date_format: String,
}

impl RenderContext {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            root: config.site.root.clone(),
            post_url: config.site.post_url.clone(),
            date_format: config.site.date_format.clone(),
        }
    }

    /// Site-relative URI of a post
    pub fn post_uri(&self, info: &PostInfo) -> String {
        build_post_uri(&self.post_url, info)
    }

    /// Public URL for a site-relative URI
    pub fn format_uri(&self, uri: &str) -> String {
        url_for(&self.root, uri)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::from_config(&SiteConfig::default())
    }
}
