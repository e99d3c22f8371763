//! Extension to MIME type table

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::ServerError;

const DEFAULT_MIME_TYPE: &str = "text/plain";

/// Table loaded from a `mime.types` style file: a MIME type followed by its
/// extensions on each line, `#` starting a comment
#[derive(Debug, Clone, Default)]
pub struct MimeTypes {
    types: HashMap<String, String>,
}

impl MimeTypes {
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let content = fs::read_to_string(path).map_err(|source| ServerError::MimeTypes {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut types = HashMap::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let mut fields = line.split_whitespace();
            let Some(mime_type) = fields.next() else {
                continue;
            };
            for extension in fields {
                types.insert(extension.to_lowercase(), mime_type.to_string());
            }
        }
        Self { types }
    }

    pub fn insert(&mut self, extension: &str, mime_type: &str) {
        self.types
            .insert(extension.to_lowercase(), mime_type.to_string());
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// MIME type for a file path, `text/plain` when unknown
    pub fn for_path(&self, path: &Path) -> &str {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.types.get(&e.to_lowercase()))
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_MIME_TYPE)
    }
}
