//! Clean the bake output and the render cache

use anyhow::Result;
use std::fs;

use crate::cache::RenderCache;
use crate::Site;

/// Remove the bake directory and the render cache
pub fn run(site: &Site) -> Result<()> {
    if site.bake_dir.exists() {
        fs::remove_dir_all(&site.bake_dir)?;
        tracing::info!("Deleted: {:?}", site.bake_dir);
    }

    RenderCache::new(&site.cache_dir).clear()?;
    Ok(())
}
