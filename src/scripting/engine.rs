//! Rhai Script Engine Implementation
//!
//! Besides Rhai's standard packages, scripts can call the numeric helpers
//! registered here (`clamp`, `lerp`, `map_range`, trigonometry, rounding).

use crate::config::ScriptLimits;
use crate::error::{FlowError, Result};
use crate::resource::ResourceHandle;
use crate::scripting::{CompiledScript, SharedScriptCache, ENTRY_POINT};
use crate::value::{Record, Value};
use rhai::{Array, Dynamic, Engine, Map, Scope};

/// Convert a tree value into a Rhai value
pub fn value_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(*b),
        Value::Number(n) => Dynamic::from_float(*n),
        Value::String(s) => Dynamic::from(s.clone()),
        Value::List(items) => {
            let array: Array = items.iter().map(value_to_dynamic).collect();
            Dynamic::from_array(array)
        }
        Value::Record(record) => {
            let map: Map = record
                .iter()
                .map(|(k, v)| (k.as_str().into(), value_to_dynamic(v)))
                .collect();
            Dynamic::from_map(map)
        }
        Value::Handle(handle) => Dynamic::from(handle.clone()),
    }
}

/// Convert a Rhai value back into a tree value
///
/// Integers become numbers. Types with no tree counterpart are kept as their
/// display string.
pub fn dynamic_to_value(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(f) = value.as_float() {
        return Value::Number(f);
    }
    if let Ok(i) = value.as_int() {
        return Value::Number(i as f64);
    }
    if value.is_string() {
        return Value::String(value.to_string());
    }
    if value.is_array() {
        let array: Array = value.cast();
        return Value::List(array.into_iter().map(dynamic_to_value).collect());
    }
    if value.is_map() {
        let map: Map = value.cast();
        let record: Record = map
            .into_iter()
            .map(|(k, v)| (k.to_string(), dynamic_to_value(v)))
            .collect();
        return Value::Record(record);
    }
    if value.is::<ResourceHandle>() {
        return Value::Handle(value.cast());
    }
    Value::String(value.to_string())
}

/// The script engine used by script components
pub struct ScriptEngine {
    engine: Engine,
    cache: SharedScriptCache,
}

impl ScriptEngine {
    /// Create a new script engine with default limits
    pub fn new() -> Self {
        Self::with_limits(&ScriptLimits::default())
    }

    pub fn with_limits(limits: &ScriptLimits) -> Self {
        Self::with_cache(limits, crate::scripting::create_shared_cache())
    }

    /// Create a script engine sharing a compiled-script cache
    pub fn with_cache(limits: &ScriptLimits, cache: SharedScriptCache) -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, limits);
        Self { engine, cache }
    }

    /// Configure the Rhai engine with helper functions and safety limits
    fn configure_engine(engine: &mut Engine, limits: &ScriptLimits) {
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_operations(limits.max_operations);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_array_size);

        engine.register_type_with_name::<ResourceHandle>("Resource");
        engine.register_fn("kind", |h: &mut ResourceHandle| h.kind().to_string());

        engine.register_fn("abs", |x: f64| x.abs());
        engine.register_fn("sqrt", |x: f64| x.sqrt());
        engine.register_fn("pow", |x: f64, y: f64| x.powf(y));
        engine.register_fn("exp", |x: f64| x.exp());
        engine.register_fn("ln", |x: f64| x.ln());
        engine.register_fn("log10", |x: f64| x.log10());
        engine.register_fn("sin", |x: f64| x.sin());
        engine.register_fn("cos", |x: f64| x.cos());
        engine.register_fn("tan", |x: f64| x.tan());
        engine.register_fn("atan2", |y: f64, x: f64| y.atan2(x));

        engine.register_fn("floor", |x: f64| x.floor());
        engine.register_fn("ceil", |x: f64| x.ceil());
        engine.register_fn("round", |x: f64| x.round());

        engine.register_fn("clamp", |x: f64, min: f64, max: f64| x.clamp(min, max));
        engine.register_fn("min", |a: f64, b: f64| a.min(b));
        engine.register_fn("max", |a: f64, b: f64| a.max(b));

        engine.register_fn("pi", || std::f64::consts::PI);
        engine.register_fn("is_nan", |x: f64| x.is_nan());

        engine.register_fn("lerp", |a: f64, b: f64, t: f64| a + (b - a) * t);
        engine.register_fn(
            "map_range",
            |x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64| {
                (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
            },
        );
    }

    /// Compile a script and cache it
    pub fn compile(&self, source: &str) -> Result<CompiledScript> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| FlowError::Script(format!("Failed to acquire cache lock: {}", e)))?;

        cache.get_or_compile(&self.engine, source)
    }

    /// Run a compiled script with `x` and `y` bound
    pub fn execute(&self, script: &CompiledScript, x: &Value, y: &Value) -> Result<Value> {
        let x = value_to_dynamic(x);
        let y = value_to_dynamic(y);
        let mut scope = Scope::new();

        let result = if script.has_entry_point() {
            self.engine
                .call_fn::<Dynamic>(&mut scope, script.ast(), ENTRY_POINT, (x, y))
        } else {
            scope.push_dynamic("x", x);
            scope.push_dynamic("y", y);
            self.engine
                .eval_ast_with_scope::<Dynamic>(&mut scope, script.ast())
        };

        result.map(dynamic_to_value).map_err(FlowError::from_rhai_error)
    }

    /// Compile and run in one step
    pub fn eval(&self, source: &str, x: &Value, y: &Value) -> Result<Value> {
        let script = self.compile(source)?;
        self.execute(&script, x, y)
    }

    /// Check that a script compiles without running it
    pub fn validate(&self, source: &str) -> Result<()> {
        self.engine
            .compile(source)
            .map(|_| ())
            .map_err(|e| FlowError::Script(format!("Validation error: {}", e)))
    }

    pub fn cache(&self) -> &SharedScriptCache {
        &self.cache
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("cache_size", &self.cache.read().map(|c| c.len()).ok())
            .finish()
    }
}
