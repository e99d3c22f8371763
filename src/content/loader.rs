//! Content loader - lists posts from the posts directory

use anyhow::Result;
use std::path::Path;
use walkdir::WalkDir;

use super::PostInfo;

/// List the posts under `posts_dir`, newest first.
///
/// Files whose names don't carry a `YYYY-MM-DD_` prefix are ignored with a
/// warning. A missing directory yields no posts.
pub fn scan_posts(posts_dir: &Path) -> Result<Vec<PostInfo>> {
    if !posts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut posts = Vec::new();
    for entry in WalkDir::new(posts_dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_markdown_file(entry.path()) {
            continue;
        }
        match PostInfo::from_path(entry.path()) {
            Some(info) => posts.push(info),
            None => tracing::warn!("Ignoring post with unexpected name: {:?}", entry.path()),
        }
    }

    posts.sort_by(|a, b| {
        (b.year, b.month, b.day, &b.path).cmp(&(a.year, a.month, a.day, &a.path))
    });
    Ok(posts)
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "md" | "markdown"))
        .unwrap_or(false)
}
