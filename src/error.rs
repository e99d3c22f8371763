//! Error types shared by the baker, the preview server and pagination

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while setting up or walking a bake
#[derive(Debug, Error)]
pub enum BakeError {
    #[error("The bake directory is not writable, or does not exist: {0:?}")]
    InvalidBakeDir(PathBuf),

    #[error("The content root is not a directory: {0:?}")]
    InvalidRoot(PathBuf),

    #[error("Can't create directory: {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Error walking the content root")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the preview server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("The given document root is not valid: {0:?}")]
    InvalidDocumentRoot(PathBuf),

    #[error("Can't read the mime types file {path:?}")]
    MimeTypes {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't bind socket to {address}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed accepting connection")]
    Accept(#[source] std::io::Error),

    #[error("Invalid route pattern '{pattern}'")]
    InvalidRoute {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A request-level failure carrying the HTTP status to answer with
    #[error("{message}")]
    Request { status: u16, message: String },

    #[error("Handler failed: {0}")]
    Handler(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create a request error with an associated HTTP status
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    /// The status code sent back when this error ends a connection
    pub fn status(&self) -> u16 {
        match self {
            Self::Request { status, .. } => *status,
            _ => 500,
        }
    }
}

/// Errors raised while loading a content item
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Can't read content file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid front-matter in {path:?}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Misuse of a pagination view, or a failure while loading it
#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("Can't call '{operation}' after the pagination posts have been loaded")]
    AlreadyLoaded { operation: &'static str },

    #[error("Couldn't find filter '{0}' in the page's configuration header")]
    UnknownFilter(String),

    #[error("Invalid filter clause: {0}")]
    InvalidFilter(String),

    #[error("Index {index} is out of range for a page of {len} posts")]
    OutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Content(#[from] ContentError),
}
