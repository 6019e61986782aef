//! Error handling for treeflow
//!
//! This module defines the crate-wide error type and a Result alias. Layer
//! specific errors (`TreeError`, `GraphError`) convert into [`FlowError`] so
//! callers can use `?` across module boundaries.

use crate::graph::GraphError;
use crate::tree::TreeError;
use thiserror::Error;

/// Main error type for treeflow operations
#[derive(Error, Debug)]
pub enum FlowError {
    /// Malformed paths or remap patterns
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    /// Structural graph errors (unknown ids, mismatched connections)
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// A Rhai script failed to compile or run
    #[error("Script error: {0}")]
    Script(String),

    /// A code template is missing required substitution tokens
    #[error("Template error: {0}")]
    Template(String),

    /// The external calculation backend rejected a request
    #[error("Backend error: {0}")]
    Backend(String),

    /// engine.toml could not be read, parsed or written
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON project data could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Another error wrapped with a note on what was being attempted
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FlowError>,
    },
}

impl FlowError {
    /// Wrap this error with a note on what was being attempted.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        FlowError::Script(err.to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Serialization(err.to_string())
    }
}

/// Result type alias for treeflow operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// `?`-friendly context for fallible calls
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Like `context`, but only builds the message on error
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
