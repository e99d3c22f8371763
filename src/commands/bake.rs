//! Bake the site into the output directory

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::fs;
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Duration;

use crate::baker::{DirectoryBaker, ProcessorPipeline};
use crate::Site;

/// Bake once. `full` rebuilds every file regardless of timestamps.
pub fn run(site: &Site, full: bool) -> Result<Vec<String>> {
    let mut parameters = site.config.baker.parameters()?;
    if full {
        parameters.smart = false;
    }
    let pipeline = ProcessorPipeline::builtin(&parameters.processors);
    tracing::debug!("Processors: {:?}", pipeline.names());

    fs::create_dir_all(&site.bake_dir)?;
    let mut baker = DirectoryBaker::new(&site.root_dir, &site.bake_dir, parameters, pipeline)?;
    Ok(baker.bake()?.to_vec())
}

/// Rebake whenever something under the site root changes
pub fn watch(site: &Site, full: bool) -> Result<()> {
    let (tx, rx) = channel();

    // Debounce editor save bursts into a single rebake
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;
    debouncer
        .watcher()
        .watch(&site.root_dir, RecursiveMode::Recursive)?;

    tracing::info!("Watching {:?} for changes. Press Ctrl+C to stop.", site.root_dir);

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<_> = events
                    .iter()
                    .filter(|event| is_source_change(site, &event.path))
                    .collect();
                if changed.is_empty() {
                    continue;
                }

                for event in &changed {
                    tracing::info!("File changed: {}", event.path.display());
                }
                if let Err(e) = run(site, full) {
                    tracing::error!("Bake failed: {:#}", e);
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
            }
            Err(e) => {
                tracing::error!("Channel error: {:?}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Changes inside the bake or cache directories are our own writes
fn is_source_change(site: &Site, path: &Path) -> bool {
    let ours = |dir: &Path| {
        path.starts_with(dir)
            || fs::canonicalize(dir)
                .map(|dir| path.starts_with(dir))
                .unwrap_or(false)
    };
    !ours(&site.bake_dir) && !ours(&site.cache_dir)
}
