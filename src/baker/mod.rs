//! Directory baker - incrementally runs source files through processors
//!
//! The baker walks a content root, mirrors its directory structure into the
//! bake directory, and hands every file to the first processor that supports
//! its extension. With smart baking enabled, files whose outputs are newer
//! than the file itself and all of its dependencies are left alone.

mod processor;
mod processors;

pub use processor::{Processor, ProcessorPipeline, ProcessorSelection};
pub use processors::{CopyProcessor, MarkdownProcessor};

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use walkdir::{DirEntry, WalkDir};

use crate::error::BakeError;

/// Knobs for a single bake run
#[derive(Debug, Clone)]
pub struct BakeParameters {
    /// Skip files whose outputs are up to date
    pub smart: bool,
    /// Matched against root-relative paths; matching entries are ignored,
    /// directories included
    pub skip_patterns: Vec<Regex>,
    /// Matched against file names; matching files are always rebuilt
    pub force_patterns: Vec<Regex>,
    pub processors: ProcessorSelection,
}

impl Default for BakeParameters {
    fn default() -> Self {
        Self {
            smart: true,
            skip_patterns: Vec::new(),
            force_patterns: Vec::new(),
            processors: ProcessorSelection::All,
        }
    }
}

/// Bakes a content root into an output directory
pub struct DirectoryBaker {
    root_dir: PathBuf,
    bake_dir: PathBuf,
    parameters: BakeParameters,
    pipeline: ProcessorPipeline,
    baked_files: Option<Vec<String>>,
}

impl DirectoryBaker {
    /// Create a baker. The bake directory must already exist and be writable.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        root_dir: P,
        bake_dir: Q,
        parameters: BakeParameters,
        pipeline: ProcessorPipeline,
    ) -> Result<Self, BakeError> {
        let root_dir = root_dir.as_ref();
        if !root_dir.is_dir() {
            return Err(BakeError::InvalidRoot(root_dir.to_path_buf()));
        }

        let bake_dir = bake_dir.as_ref();
        let writable = fs::metadata(bake_dir)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false);
        if !writable {
            return Err(BakeError::InvalidBakeDir(bake_dir.to_path_buf()));
        }

        if pipeline.is_empty() {
            tracing::warn!("No processors selected, nothing will be baked");
        }

        Ok(Self {
            root_dir: fs::canonicalize(root_dir)?,
            bake_dir: fs::canonicalize(bake_dir)?,
            parameters,
            pipeline,
            baked_files: None,
        })
    }

    /// Relative paths written by the last `bake()` call, if any
    pub fn baked_files(&self) -> Option<&[String]> {
        self.baked_files.as_deref()
    }

    /// Bake the whole content root.
    ///
    /// A processor failure aborts the run; files baked before the failure stay
    /// on disk but the baked file list is not updated.
    pub fn bake(&mut self) -> Result<&[String]> {
        let start = Instant::now();
        let mut baked = Vec::new();

        let walker = WalkDir::new(&self.root_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.should_skip(entry));

        for entry in walker {
            let entry = entry.map_err(BakeError::from)?;
            let relative = relative_path(&self.root_dir, entry.path());

            if entry.file_type().is_dir() {
                let destination = self.bake_dir.join(&relative);
                if !destination.is_dir() {
                    fs::create_dir_all(&destination).map_err(|source| BakeError::CreateDir {
                        path: destination.clone(),
                        source,
                    })?;
                }
            } else if entry.file_type().is_file() && self.bake_file(&entry, &relative)? {
                baked.push(relative);
            }
        }

        tracing::info!(
            "Baked {} files in {:.2}s",
            baked.len(),
            start.elapsed().as_secs_f64()
        );
        let baked = self.baked_files.insert(baked);
        Ok(baked.as_slice())
    }

    /// Skipped entries are pruned with their whole subtree. The bake
    /// directory itself is never entered.
    fn should_skip(&self, entry: &DirEntry) -> bool {
        let relative = relative_path(&self.root_dir, entry.path());
        if self
            .parameters
            .skip_patterns
            .iter()
            .any(|p| p.is_match(&relative))
        {
            tracing::debug!("Skipping {}", relative);
            return true;
        }

        entry.file_type().is_dir()
            && fs::canonicalize(entry.path())
                .map(|p| p == self.bake_dir)
                .unwrap_or(false)
    }

    /// Returns whether the file was (re)processed
    fn bake_file(&self, entry: &DirEntry, relative: &str) -> Result<bool> {
        let path = entry.path();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let Some(processor) = self.pipeline.find(extension) else {
            tracing::warn!("No processor for {}", relative);
            return Ok(false);
        };

        let destination_dir = match Path::new(relative).parent() {
            Some(parent) => self.bake_dir.join(parent),
            None => self.bake_dir.clone(),
        };
        let file_name = entry.file_name().to_string_lossy();

        let forced = self
            .parameters
            .force_patterns
            .iter()
            .any(|p| p.is_match(&file_name));
        if !forced
            && self.parameters.smart
            && is_up_to_date(processor, path, &file_name, &destination_dir, relative)
        {
            tracing::debug!("Up to date: {}", relative);
            return Ok(false);
        }

        let start = Instant::now();
        processor
            .process(path, &destination_dir)
            .with_context(|| format!("Error processing '{}'", relative))?;
        tracing::info!(
            "[{:>8.1} ms] {}",
            start.elapsed().as_secs_f64() * 1000.0,
            relative
        );
        Ok(true)
    }
}

/// Every input time (the file and its dependencies) must be strictly older
/// than every expected output, and every output must exist.
fn is_up_to_date(
    processor: &dyn Processor,
    input: &Path,
    file_name: &str,
    destination_dir: &Path,
    relative: &str,
) -> bool {
    let mut input_times = match modified(input) {
        Ok(time) => vec![time],
        Err(_) => return false,
    };

    match processor.dependencies(input) {
        Ok(Some(dependencies)) => {
            for dependency in dependencies {
                match modified(&dependency) {
                    Ok(time) => input_times.push(time),
                    Err(e) => {
                        tracing::warn!(
                            "Can't stat dependency {:?}: {} -- Will force-bake {}",
                            dependency,
                            e,
                            relative
                        );
                        return false;
                    }
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("{:#} -- Will force-bake {}", e, relative);
            return false;
        }
    }

    let mut output_times = Vec::new();
    for output in processor.output_filenames(file_name) {
        match modified(&destination_dir.join(output)) {
            Ok(time) => output_times.push(time),
            Err(_) => return false,
        }
    }

    input_times
        .iter()
        .all(|i| output_times.iter().all(|o| i < o))
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// Root-relative path with forward slashes
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
