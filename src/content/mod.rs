//! Content module - posts, content items and markdown processing

mod context;
mod frontmatter;
pub mod loader;
mod markdown;
mod post;
mod repository;

pub use context::RenderContext;
pub use frontmatter::{scalar_to_string, FrontMatter};
pub use markdown::{html_escape, MarkdownRenderer};
pub use post::{ContentItem, LoadedContent, PostInfo};
pub use repository::ContentRepository;
