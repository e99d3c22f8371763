//! File processor contract and the priority-sorted pipeline

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use super::processors::{CopyProcessor, MarkdownProcessor};

/// A pluggable transform bound to one or more file extensions
pub trait Processor {
    /// Name used by the allow-list in the bake parameters
    fn name(&self) -> &str;

    /// Higher priorities are tried first
    fn priority(&self) -> i32 {
        0
    }

    fn supports_extension(&self, extension: &str) -> bool;

    /// Extra input files the output depends on, if any.
    fn dependencies(&self, _path: &Path) -> Result<Option<Vec<PathBuf>>> {
        Ok(None)
    }

    /// Names of the files `process` writes for the given input file name
    fn output_filenames(&self, filename: &str) -> Vec<String>;

    /// Transform `input` into one or more files inside `output_dir`
    fn process(&self, input: &Path, output_dir: &Path) -> Result<()>;
}

/// Which processors a bake may use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProcessorSelection {
    #[default]
    All,
    Only(Vec<String>),
}

impl ProcessorSelection {
    pub fn allows(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

impl<'de> Deserialize<'de> for ProcessorSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(name) if name == "*" || name == "all" => Self::All,
            Raw::One(name) => Self::Only(vec![name]),
            Raw::Many(names) => Self::Only(names),
        })
    }
}

impl Serialize for ProcessorSelection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::All => serializer.serialize_str("*"),
            Self::Only(names) => names.serialize(serializer),
        }
    }
}

/// Processors ordered by descending priority, filtered by a selection
pub struct ProcessorPipeline {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorPipeline {
    /// Build a pipeline from arbitrary processors.
    ///
    /// The sort is stable, so processors with equal priority keep the order
    /// they were given in.
    pub fn new(mut processors: Vec<Box<dyn Processor>>, selection: &ProcessorSelection) -> Self {
        processors.retain(|p| selection.allows(p.name()));
        processors.sort_by_key(|p| Reverse(p.priority()));
        Self { processors }
    }

    /// Pipeline made of the built-in `markdown` and `copy` processors
    pub fn builtin(selection: &ProcessorSelection) -> Self {
        Self::new(
            vec![Box::new(CopyProcessor), Box::new(MarkdownProcessor::new())],
            selection,
        )
    }

    /// First processor, in priority order, that handles the extension
    pub fn find(&self, extension: &str) -> Option<&dyn Processor> {
        self.processors
            .iter()
            .find(|p| p.supports_extension(extension))
            .map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
