//! Get-or-create registry of content items

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::ContentItem;

/// Owns every `ContentItem` resolved during one bake or server run.
///
/// Items are keyed by normalized path, so filtering, slicing and repeated
/// access all share the same instance.
#[derive(Debug, Default)]
pub struct ContentRepository {
    items: RefCell<HashMap<PathBuf, Rc<ContentItem>>>,
}

impl ContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the item for `path`, creating it on first request
    pub fn get_or_create(&self, path: &Path, uri: &str, date: NaiveDate) -> Rc<ContentItem> {
        let key = normalize_path(path);
        let mut items = self.items.borrow_mut();
        Rc::clone(
            items
                .entry(key.clone())
                .or_insert_with(|| Rc::new(ContentItem::new(key, uri.to_string(), date))),
        )
    }

    pub fn get(&self, path: &Path) -> Option<Rc<ContentItem>> {
        self.items.borrow().get(&normalize_path(path)).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

/// Canonical path when the file exists, the path as given otherwise
fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
