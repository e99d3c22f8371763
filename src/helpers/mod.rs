//! Helper functions shared by content projection and the preview server

mod date;
mod url;

pub use date::*;
pub use url::*;
