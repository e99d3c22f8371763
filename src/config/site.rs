//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::baker::{BakeParameters, ProcessorSelection};
use crate::error::BakeError;

/// Main site configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site: SiteSection,
    pub baker: BakerConfig,
    pub server: ServerConfig,

    /// Everything else: page configuration fields and named filters
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// The filter definitions and other page-level settings, as a YAML mapping
    pub fn page_config(&self) -> serde_yaml::Mapping {
        self.extra
            .iter()
            .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.clone()))
            .collect()
    }
}

/// General site settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub title: String,
    pub root: String,
    pub post_url: String,
    pub date_format: String,
    pub posts_per_page: usize,
    pub posts_dir: String,
    pub pages_dir: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            title: "Untitled Bakehouse Site".to_string(),
            root: "/".to_string(),
            post_url: "%year%/%month%/%day%/%slug%".to_string(),
            date_format: "%B %d, %Y".to_string(),
            posts_per_page: 5,
            posts_dir: "_content/posts".to_string(),
            pages_dir: "_content/pages".to_string(),
        }
    }
}

/// Baker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BakerConfig {
    pub smart: bool,
    pub skip_patterns: Vec<String>,
    pub force_patterns: Vec<String>,
    pub processors: ProcessorSelection,
    pub output_dir: String,
}

impl Default for BakerConfig {
    fn default() -> Self {
        Self {
            smart: true,
            skip_patterns: vec!["^_".to_string(), r"(^|/)\.".to_string()],
            force_patterns: Vec::new(),
            processors: ProcessorSelection::All,
            output_dir: "_counter".to_string(),
        }
    }
}

impl BakerConfig {
    /// Compile the configured patterns into bake parameters
    pub fn parameters(&self) -> Result<BakeParameters, BakeError> {
        Ok(BakeParameters {
            smart: self.smart,
            skip_patterns: compile_patterns(&self.skip_patterns)?,
            force_patterns: compile_patterns(&self.force_patterns)?,
            processors: self.processors.clone(),
        })
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<regex::Regex>, BakeError> {
    patterns
        .iter()
        .map(|p| {
            regex::Regex::new(p).map_err(|source| BakeError::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Preview server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub mime_types: String,
    pub cache_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
            mime_types: "mime.types".to_string(),
            cache_dir: "_cache".to_string(),
        }
    }
}
