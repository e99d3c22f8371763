//! Front-matter parsing

use serde_yaml::{Mapping, Value};

/// The configuration header at the top of a content file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    values: Mapping,
}

impl FrontMatter {
    /// Parse front-matter from content string.
    /// Returns (front_matter, remaining_content)
    pub fn parse(content: &str) -> Result<(Self, &str), serde_yaml::Error> {
        let trimmed = content.trim_start();
        let Some(rest) = trimmed.strip_prefix("---") else {
            return Ok((Self::default(), content));
        };
        let rest = rest.trim_start_matches(['\n', '\r']);

        let (yaml, remaining) = if let Some(body) = rest.strip_prefix("---") {
            ("", body)
        } else if let Some(end_pos) = rest.find("\n---") {
            (&rest[..end_pos], &rest[end_pos + 4..])
        } else {
            // No closing ---, treat as no front-matter
            return Ok((Self::default(), content));
        };
        // Drop the remainder of the closing fence line
        let remaining = match remaining.find('\n') {
            Some(pos) if remaining[..pos].trim().is_empty() => &remaining[pos + 1..],
            _ => remaining.trim_start_matches(['\r', '\n']),
        };

        if yaml.trim().is_empty() {
            return Ok((Self::default(), remaining));
        }

        let values: Mapping = serde_yaml::from_str(yaml)?;
        Ok((Self { values }, remaining))
    }

    pub fn from_mapping(values: Mapping) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// A field that may be written as one scalar or as a list of scalars
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(value) => scalar_to_string(value).into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn values(&self) -> &Mapping {
        &self.values
    }
}

/// Render a scalar YAML value as a string, for comparisons against filters
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
title: Hello World
category: code
tags: [rust, web]
---
This is the content."#;

        let (fm, body) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.get_str("title"), Some("Hello World"));
        assert_eq!(fm.get_str("category"), Some("code"));
        assert_eq!(fm.string_list("tags"), vec!["rust", "web"]);
        assert_eq!(body, "This is the content.");
    }

    #[test]
    fn test_single_tag_as_list() {
        let (fm, _) = FrontMatter::parse("---\ntags: rust\n---\nbody").unwrap();
        assert_eq!(fm.string_list("tags"), vec!["rust"]);
        assert!(fm.string_list("missing").is_empty());
    }

    #[test]
    fn test_no_frontmatter() {
        let content = "Just some content without front-matter.";
        let (fm, body) = FrontMatter::parse(content).unwrap();
        assert!(fm.values().is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_empty_frontmatter() {
        let (fm, body) = FrontMatter::parse("---\n---\nBody").unwrap();
        assert!(fm.values().is_empty());
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(FrontMatter::parse("---\ntitle: [unclosed\n---\nBody").is_err());
    }
}
