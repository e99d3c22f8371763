//! Pagination over a post collection
//!
//! A `PaginationView` is configured first (skip, limit, filter), then loaded
//! by the first read. Loading is one-way: after it, every configuration
//! method fails with `PaginationError::AlreadyLoaded`.

mod filter;

pub use filter::{FilterClause, Predicate};

use indexmap::IndexMap;
use serde::Serialize;
use std::rc::Rc;

use crate::content::{ContentItem, ContentRepository, PostInfo, RenderContext};
use crate::error::PaginationError;
use crate::helpers::{format_date, resolve_time, to_local};

/// What templates see for one post of the current page
#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub url: String,
    pub slug: String,
    pub timestamp: i64,
    pub date: String,
    pub content: String,
    /// Set when `content` is only the abstract of the post
    pub has_more: bool,
    /// The post's own configuration header
    #[serde(flatten)]
    pub config: IndexMap<String, serde_json::Value>,
}

/// Keys of `PostData` that a post's configuration can't override
const RESERVED_KEYS: &[&str] = &["url", "slug", "timestamp", "date", "content", "has_more"];

#[derive(Debug)]
struct LoadedPage {
    posts: Vec<PostData>,
    total_count: usize,
    has_more: bool,
}

#[derive(Debug)]
enum Phase {
    Configuring,
    Loaded(LoadedPage),
}

/// Lazily loaded, filterable window over an ordered post collection
pub struct PaginationView<'a> {
    source: &'a [PostInfo],
    repository: &'a ContentRepository,
    context: &'a RenderContext,
    page_config: &'a serde_yaml::Mapping,
    filter: Option<FilterClause>,
    skip: usize,
    limit: Option<usize>,
    phase: Phase,
}

impl<'a> PaginationView<'a> {
    /// `page_config` holds the named filters available to `filter()`
    pub fn new(
        source: &'a [PostInfo],
        repository: &'a ContentRepository,
        context: &'a RenderContext,
        page_config: &'a serde_yaml::Mapping,
    ) -> Self {
        Self {
            source,
            repository,
            context,
            page_config,
            filter: None,
            skip: 0,
            limit: None,
            phase: Phase::Configuring,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.phase, Phase::Loaded(_))
    }

    fn ensure_not_loaded(&self, operation: &'static str) -> Result<(), PaginationError> {
        if self.is_loaded() {
            return Err(PaginationError::AlreadyLoaded { operation });
        }
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<&mut Self, PaginationError> {
        self.ensure_not_loaded("skip")?;
        self.skip = count;
        Ok(self)
    }

    /// Maximum number of posts in the page. Zero means no limit.
    pub fn limit(&mut self, count: usize) -> Result<&mut Self, PaginationError> {
        self.ensure_not_loaded("limit")?;
        self.limit = (count > 0).then_some(count);
        Ok(self)
    }

    pub fn set_filter(&mut self, clause: FilterClause) -> Result<&mut Self, PaginationError> {
        self.ensure_not_loaded("set_filter")?;
        self.filter = Some(clause);
        Ok(self)
    }

    /// Use a filter defined in the page configuration
    pub fn filter(&mut self, name: &str) -> Result<&mut Self, PaginationError> {
        self.ensure_not_loaded("filter")?;
        let definition = self
            .page_config
            .get(name)
            .ok_or_else(|| PaginationError::UnknownFilter(name.to_string()))?;
        self.filter = Some(FilterClause::compile(definition)?);
        Ok(self)
    }

    pub fn in_category(&mut self, category: &str) -> Result<&mut Self, PaginationError> {
        self.ensure_not_loaded("in_category")?;
        self.filter = Some(FilterClause::in_category(category));
        Ok(self)
    }

    pub fn with_tag(&mut self, tag: &str) -> Result<&mut Self, PaginationError> {
        self.ensure_not_loaded("with_tag")?;
        self.filter = Some(FilterClause::with_tag(tag));
        Ok(self)
    }

    pub fn with_tags<S: AsRef<str>>(&mut self, tags: &[S]) -> Result<&mut Self, PaginationError> {
        self.ensure_not_loaded("with_tags")?;
        self.filter = Some(FilterClause::with_tags(tags));
        Ok(self)
    }

    /// Drop any filter, skip and limit
    pub fn all(&mut self) -> Result<&mut Self, PaginationError> {
        self.ensure_not_loaded("all")?;
        self.filter = None;
        self.skip = 0;
        self.limit = None;
        Ok(self)
    }

    /// Number of posts in the current page
    pub fn len(&mut self) -> Result<usize, PaginationError> {
        Ok(self.load()?.posts.len())
    }

    pub fn is_empty(&mut self) -> Result<bool, PaginationError> {
        Ok(self.len()? == 0)
    }

    /// Number of posts in the whole (filtered) collection
    pub fn total_count(&mut self) -> Result<usize, PaginationError> {
        Ok(self.load()?.total_count)
    }

    /// Whether posts remain past the current page
    pub fn has_more(&mut self) -> Result<bool, PaginationError> {
        Ok(self.load()?.has_more)
    }

    pub fn posts(&mut self) -> Result<&[PostData], PaginationError> {
        Ok(self.load()?.posts.as_slice())
    }

    pub fn get(&mut self, index: usize) -> Result<&PostData, PaginationError> {
        let posts = &self.load()?.posts;
        let len = posts.len();
        posts
            .get(index)
            .ok_or(PaginationError::OutOfRange { index, len })
    }

    fn load(&mut self) -> Result<&LoadedPage, PaginationError> {
        if let Phase::Configuring = self.phase {
            let page = self.build_page()?;
            self.phase = Phase::Loaded(page);
        }
        match &self.phase {
            Phase::Loaded(page) => Ok(page),
            Phase::Configuring => unreachable!("pagination was just loaded"),
        }
    }

    fn build_page(&self) -> Result<LoadedPage, PaginationError> {
        let (selected, total_count) = match &self.filter {
            Some(filter) => {
                // The whole source has to be filtered to know the total count,
                // even when only a small window is requested.
                let mut matching = Vec::new();
                for info in self.source {
                    let Some(item) = self.item(info) else {
                        continue;
                    };
                    if filter.matches(&item.load()?.config) {
                        matching.push(item);
                    }
                }
                let total = matching.len();
                let (start, end) = self.window(total);
                (matching.drain(start..end).collect::<Vec<_>>(), total)
            }
            None => {
                let total = self.source.len();
                let (start, end) = self.window(total);
                let items = self.source[start..end]
                    .iter()
                    .filter_map(|info| self.item(info))
                    .collect::<Vec<_>>();
                (items, total)
            }
        };

        let posts = selected
            .iter()
            .map(|item| self.post_data(item))
            .collect::<Result<Vec<_>, _>>()?;
        let has_more = self
            .limit
            .is_some_and(|limit| total_count > self.skip.saturating_add(limit));

        Ok(LoadedPage {
            posts,
            total_count,
            has_more,
        })
    }

    /// `[skip, min(skip + limit, total))`, clamped to the collection
    fn window(&self, total: usize) -> (usize, usize) {
        let start = self.skip.min(total);
        let end = match self.limit {
            Some(limit) => self.skip.saturating_add(limit).min(total),
            None => total,
        };
        (start, end.max(start))
    }

    fn item(&self, info: &PostInfo) -> Option<Rc<ContentItem>> {
        let date = info.date()?;
        Some(
            self.repository
                .get_or_create(&info.path, &self.context.post_uri(info), date),
        )
    }

    fn post_data(&self, item: &ContentItem) -> Result<PostData, PaginationError> {
        let loaded = item.load()?;

        let mut datetime = item.date().and_hms_opt(0, 0, 0).unwrap_or_default();
        if let Some(time) = loaded
            .config
            .get("time")
            .and_then(crate::content::scalar_to_string)
        {
            match resolve_time(item.date(), &time) {
                Some(resolved) => datetime = resolved,
                None => tracing::warn!("Can't parse time '{}' in {:?}", time, item.path()),
            }
        }
        let local = to_local(datetime);

        let (content, has_more) = match &loaded.abstract_content {
            Some(abstract_content) => (abstract_content.clone(), true),
            None => (loaded.content.clone(), false),
        };

        let mut config = IndexMap::new();
        for (key, value) in loaded.config.values() {
            let Some(key) = key.as_str() else {
                continue;
            };
            if RESERVED_KEYS.contains(&key) {
                continue;
            }
            match serde_json::to_value(value) {
                Ok(value) => {
                    config.insert(key.to_string(), value);
                }
                Err(e) => tracing::warn!("Dropping field '{}' of {:?}: {}", key, item.path(), e),
            }
        }

        Ok(PostData {
            url: self.context.format_uri(item.uri()),
            slug: item.uri().to_string(),
            timestamp: local.timestamp(),
            date: format_date(&local, &self.context.date_format),
            content,
            has_more,
            config,
        })
    }
}
