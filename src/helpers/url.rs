//! URL helper functions

use crate::content::PostInfo;

/// Prefix a site-relative URI with the site root
///
/// # Examples
/// ```ignore
/// url_for("/blog/", "2024/01/15/hello") // -> "/blog/2024/01/15/hello"
/// ```
pub fn url_for(root: &str, path: &str) -> String {
    let root = root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Expand a post URL format such as `%year%/%month%/%day%/%slug%`
pub fn build_post_uri(format: &str, info: &PostInfo) -> String {
    format
        .replace("%year%", &format!("{:04}", info.year))
        .replace("%month%", &format!("{:02}", info.month))
        .replace("%day%", &format!("{:02}", info.day))
        .replace("%slug%", &info.slug)
        .trim_start_matches('/')
        .to_string()
}
