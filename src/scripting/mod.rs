//! Rhai scripting for the Script component
//!
//! A script receives the component's `x` and `y` inputs and produces one
//! result value. It may either define a `calc` function:
//!
//! ```rhai
//! fn calc(x, y) {
//!     x * y + 1.0
//! }
//! ```
//!
//! or be a bare expression over `x` and `y`:
//!
//! ```rhai
//! if y == () { x } else { x + y }
//! ```
//!
//! Unconnected optional inputs arrive as `()`. Lists arrive as arrays and
//! records as object maps; whatever the script returns is converted back into
//! a tree value.

mod engine;

pub use engine::{dynamic_to_value, value_to_dynamic, ScriptEngine};

use crate::error::{FlowError, Result};
use rhai::{Engine, AST};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Name of the optional entry point function
pub const ENTRY_POINT: &str = "calc";

/// A compiled script, ready to run many times
#[derive(Clone)]
pub struct CompiledScript {
    ast: AST,
    source: String,
    has_entry_point: bool,
}

impl CompiledScript {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the script defines `calc(x, y)`
    pub fn has_entry_point(&self) -> bool {
        self.has_entry_point
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("source", &self.source)
            .field("has_entry_point", &self.has_entry_point)
            .finish()
    }
}

/// Compiled scripts keyed by source, so re-running a component does not recompile
#[derive(Default)]
pub struct ScriptCache {
    cache: HashMap<String, CompiledScript>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached script or compile and cache it
    pub fn get_or_compile(&mut self, engine: &Engine, source: &str) -> Result<CompiledScript> {
        if let Some(script) = self.cache.get(source) {
            return Ok(script.clone());
        }

        let ast = engine
            .compile(source)
            .map_err(|e| FlowError::Script(format!("Compilation error: {}", e)))?;
        let has_entry_point = ast
            .iter_functions()
            .any(|f| f.name == ENTRY_POINT && f.params.len() == 2);

        let script = CompiledScript {
            ast,
            source: source.to_string(),
            has_entry_point,
        };
        self.cache.insert(source.to_string(), script.clone());
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// Thread-safe script cache wrapper
pub type SharedScriptCache = Arc<RwLock<ScriptCache>>;

pub fn create_shared_cache() -> SharedScriptCache {
    Arc::new(RwLock::new(ScriptCache::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_cache() {
        let engine = Engine::new();
        let mut cache = ScriptCache::new();

        let script = cache.get_or_compile(&engine, "fn calc(x, y) { x * 2.0 }").unwrap();
        assert!(script.has_entry_point());
        assert_eq!(cache.len(), 1);

        cache.get_or_compile(&engine, "fn calc(x, y) { x * 2.0 }").unwrap();
        assert_eq!(cache.len(), 1);

        let expr = cache.get_or_compile(&engine, "x + 1").unwrap();
        assert!(!expr.has_entry_point());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_compile_error_is_script_error() {
        let engine = Engine::new();
        let mut cache = ScriptCache::new();
        let err = cache.get_or_compile(&engine, "fn calc(x, y) {").unwrap_err();
        assert!(matches!(err, FlowError::Script(_)));
        assert!(cache.is_empty());
    }
}
