//! Discovers callable test functions for the sequence interpreter by
//! scanning a directory for `test_*.rhai` modules and exposing them behind
//! the engine's registry interface.

mod bridge;
mod module;
mod scan;

pub use module::ScriptModule;
pub use scan::ScriptRegistry;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to compile module \"{name}\": {message}")]
    Compile { name: String, message: String },
}
