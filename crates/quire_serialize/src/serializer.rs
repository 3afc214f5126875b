//! Depth-first serializer turning value graphs into signature JSON.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use quire_foundation::{Callable, Error, ErrorKind, Instance, Result, Value};
use serde_json::Value as Json;
use tracing::warn;

use crate::config::SerializerConfig;
use crate::signature;

/// Instance ids are unique across the whole process.
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_instance_id() -> u64 {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Serializes values, deduplicating repeated instances into links.
///
/// One serializer is one pass: an instance met a second time (through
/// sharing or a cycle) is emitted as a link to the id of its first
/// occurrence. Reuse a serializer to keep deduplicating across several
/// values, or call [`Serializer::reset`] to start a fresh pass.
#[derive(Debug, Default)]
pub struct Serializer {
    config: SerializerConfig,
    ids: HashMap<usize, u64>,
    /// Visited instances stay alive so their addresses are not reused.
    pinned: Vec<Instance>,
    /// Instances without a module name currently being inlined.
    inlining: HashSet<usize>,
    functions: Vec<Callable>,
}

impl Serializer {
    /// Creates a serializer with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a serializer with the given configuration.
    #[must_use]
    pub fn with_config(config: SerializerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> SerializerConfig {
        self.config
    }

    /// Functions moved to the side table, indexed by their signature id.
    #[must_use]
    pub fn functions(&self) -> &[Callable] {
        &self.functions
    }

    /// Forgets every instance seen so far and clears the side table.
    pub fn reset(&mut self) {
        self.ids.clear();
        self.pinned.clear();
        self.inlining.clear();
        self.functions.clear();
    }

    /// Serializes a value into JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if an instance fails to produce its state, if an
    /// instance without module name is met in critical mode, or if an
    /// anonymous function is met in strict mode.
    pub fn serialize(&mut self, value: &Value) -> Result<Json> {
        Ok(match value {
            Value::Null => Json::Null,
            Value::Undefined => signature::sentinel(signature::Tag::Undefined),
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::Float(n) => match serde_json::Number::from_f64(*n) {
                Some(number) => Json::Number(number),
                None => signature::non_finite(*n),
            },
            Value::String(s) => Json::String(s.to_string()),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.serialize(item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, item) in map.iter() {
                    out.insert(key.to_string(), self.serialize(item)?);
                }
                Json::Object(out)
            }
            Value::Instance(instance) => self.serialize_instance(instance)?,
            Value::Function(function) => self.serialize_function(function)?,
        })
    }

    /// Serializes a value into JSON text.
    ///
    /// # Errors
    ///
    /// See [`Self::serialize`].
    pub fn to_string(&mut self, value: &Value) -> Result<String> {
        let json = self.serialize(value)?;
        serde_json::to_string(&json).map_err(|e| Error::serialization(e.to_string()))
    }

    /// Serializes a value into `MessagePack` bytes.
    ///
    /// The bytes carry the same signature document as the JSON text.
    ///
    /// # Errors
    ///
    /// See [`Self::serialize`]; encoding errors are reported as well.
    pub fn to_bytes(&mut self, value: &Value) -> Result<Vec<u8>> {
        let json = self.serialize(value)?;
        rmp_serde::to_vec_named(&json)
            .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
    }

    fn serialize_instance(&mut self, instance: &Instance) -> Result<Json> {
        let addr = instance.addr();
        if let Some(id) = self.ids.get(&addr) {
            return Ok(signature::link(*id));
        }

        let Some(module) = instance.module_name().map(str::to_string) else {
            if self.config.critical {
                return Err(Error::new(ErrorKind::MissingModuleName(format!(
                    "{instance:?}"
                ))));
            }
            warn!(instance = ?instance, "instance has no module name, serializing its plain state");
            if !self.inlining.insert(addr) {
                return Err(Error::serialization(format!(
                    "cycle through {instance:?}, which has no module name"
                )));
            }
            let state = instance.object().serializable_state();
            let result = state.and_then(|state| self.serialize(&state));
            self.inlining.remove(&addr);
            return result;
        };

        // The id is known before the state is walked so cycles end in links
        let id = next_instance_id();
        self.ids.insert(addr, id);
        self.pinned.push(instance.clone());

        let state = instance.object().serializable_state()?;
        let state = self.serialize(&state)?;
        Ok(signature::instance(&module, id, state))
    }

    fn serialize_function(&mut self, function: &Callable) -> Result<Json> {
        if let Some(module) = &function.module {
            return Ok(signature::named_function(module));
        }
        if self.config.strict_functions {
            return Err(Error::new(ErrorKind::UnsupportedFunction(
                "anonymous function".to_string(),
            )));
        }
        let index = match self.functions.iter().position(|f| f.ptr_eq(function)) {
            Some(index) => index,
            None => {
                self.functions.push(function.clone());
                self.functions.len() - 1
            }
        };
        Ok(signature::function(index))
    }
}

/// Serializes a value into JSON text with a fresh default serializer.
///
/// # Errors
///
/// See [`Serializer::serialize`].
pub fn to_string(value: &Value) -> Result<String> {
    Serializer::new().to_string(value)
}
