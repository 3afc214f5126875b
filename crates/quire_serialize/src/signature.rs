//! Wire signatures standing in for values plain JSON cannot carry.
//!
//! A signature is an object whose `$serialized$` key names its kind:
//!
//! ```text
//! {"$serialized$":"inst","module":"entity.Record","id":1,"state":{..}}
//! {"$serialized$":"link","id":1}
//! {"$serialized$":"func","module":"app.handlers.onSave"}
//! {"$serialized$":"function","id":0}
//! {"$serialized$":"+inf"} {"$serialized$":"-inf"} {"$serialized$":"NaN"} {"$serialized$":"undef"}
//! ```
//!
//! The shape is the persisted format and must stay stable.

use serde_json::{Map, Value as Json, json};

/// Key marking a signature object.
pub const SERIALIZED_KEY: &str = "$serialized$";
/// Key holding the module name.
pub const MODULE_KEY: &str = "module";
/// Key holding the instance id or function index.
pub const ID_KEY: &str = "id";
/// Key holding the instance state.
pub const STATE_KEY: &str = "state";

/// Kind of a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// First occurrence of an instance.
    Instance,
    /// Repeated occurrence of an instance.
    Link,
    /// Function known by module name.
    NamedFunction,
    /// Function stored in the side table.
    Function,
    /// Positive infinity.
    PositiveInfinity,
    /// Negative infinity.
    NegativeInfinity,
    /// Not a number.
    NaN,
    /// Undefined.
    Undefined,
}

impl Tag {
    /// Wire name of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instance => "inst",
            Self::Link => "link",
            Self::NamedFunction => "func",
            Self::Function => "function",
            Self::PositiveInfinity => "+inf",
            Self::NegativeInfinity => "-inf",
            Self::NaN => "NaN",
            Self::Undefined => "undef",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "inst" => Self::Instance,
            "link" => Self::Link,
            "func" => Self::NamedFunction,
            "function" => Self::Function,
            "+inf" => Self::PositiveInfinity,
            "-inf" => Self::NegativeInfinity,
            "NaN" => Self::NaN,
            "undef" => Self::Undefined,
            _ => return None,
        })
    }

    /// Returns the tag name of a signature object, if `object` is one.
    #[must_use]
    pub fn name_of(object: &Map<String, Json>) -> Option<&str> {
        object.get(SERIALIZED_KEY).and_then(Json::as_str)
    }
}

/// Builds an instance signature.
#[must_use]
pub fn instance(module: &str, id: u64, state: Json) -> Json {
    json!({
        SERIALIZED_KEY: Tag::Instance.as_str(),
        MODULE_KEY: module,
        ID_KEY: id,
        STATE_KEY: state,
    })
}

/// Builds a link signature.
#[must_use]
pub fn link(id: u64) -> Json {
    json!({ SERIALIZED_KEY: Tag::Link.as_str(), ID_KEY: id })
}

/// Builds a named function signature.
#[must_use]
pub fn named_function(module: &str) -> Json {
    json!({ SERIALIZED_KEY: Tag::NamedFunction.as_str(), MODULE_KEY: module })
}

/// Builds a side table function signature.
#[must_use]
pub fn function(index: usize) -> Json {
    json!({ SERIALIZED_KEY: Tag::Function.as_str(), ID_KEY: index })
}

/// Builds a sentinel signature without payload.
#[must_use]
pub fn sentinel(tag: Tag) -> Json {
    json!({ SERIALIZED_KEY: tag.as_str() })
}

/// Sentinel for a non-finite float.
#[must_use]
pub fn non_finite(value: f64) -> Json {
    if value.is_nan() {
        sentinel(Tag::NaN)
    } else if value > 0.0 {
        sentinel(Tag::PositiveInfinity)
    } else {
        sentinel(Tag::NegativeInfinity)
    }
}
