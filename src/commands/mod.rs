//! Command implementations behind the CLI

pub mod bake;
pub mod clean;
pub mod serve;
