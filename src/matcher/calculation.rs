//! Per-item calculation results, immediate or deferred.

use crate::tree::TreePath;
use crate::value::Record;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Future returned by calculations delegated to something outside the engine.
pub type CalcFuture = Pin<Box<dyn Future<Output = Result<Record, String>> + Send + 'static>>;

/// What a per-item calculation hands back to the matcher.
pub enum Calculation {
    Ready(Result<Record, String>),
    Deferred(CalcFuture),
}

impl Calculation {
    pub fn ok(record: Record) -> Self {
        Calculation::Ready(Ok(record))
    }

    pub fn err(message: impl Into<String>) -> Self {
        Calculation::Ready(Err(message.into()))
    }

    pub fn deferred(future: impl Future<Output = Result<Record, String>> + Send + 'static) -> Self {
        Calculation::Deferred(Box::pin(future))
    }

    /// Single-output shorthand: `{name: value}`.
    pub fn single(name: &str, value: impl Into<crate::value::Value>) -> Self {
        let mut record = Record::new();
        record.insert(name.to_string(), value.into());
        Calculation::ok(record)
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Calculation::Deferred(_))
    }

    pub(crate) async fn resolve(self) -> Result<Record, String> {
        match self {
            Calculation::Ready(result) => result,
            Calculation::Deferred(future) => future.await,
        }
    }
}

impl std::fmt::Debug for Calculation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Calculation::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Calculation::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A calculation that failed for one row. Other rows are unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("row {row} at {path}: {message}")]
pub struct CalculationError {
    pub row: usize,
    pub path: TreePath,
    pub message: String,
}
