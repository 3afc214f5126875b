//! Two-pass revival of signature JSON into live values.
//!
//! Pass 1 ([`Document::parse`]) turns JSON into an intermediate tree where
//! every instance signature is moved into a table keyed by id and replaced by
//! a reference. Pass 2 ([`Reviver::revive_document`]) materializes instances
//! bottom-up through the [`ClassRegistry`]. A reference to an instance whose
//! state is still being materialized closes a cycle: it is revived as `null`
//! and restored once every instance exists.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use quire_foundation::{
    Array, Callable, Error, ErrorKind, Instance, Map, PathSegment, Result, Value,
};
use serde_json::Value as Json;
use tracing::debug;

use crate::registry::ClassRegistry;
use crate::signature::{ID_KEY, MODULE_KEY, STATE_KEY, Tag};

/// Node of the intermediate document.
#[derive(Clone, Debug)]
pub enum Node {
    /// A value needing no further resolution.
    Plain(Value),
    /// Array of nodes.
    Array(Vec<Node>),
    /// Object of nodes in document order.
    Object(Vec<(Arc<str>, Node)>),
    /// Reference to an instance in the table (first occurrence or link).
    Ref(u64),
    /// Function known by module name.
    NamedFunction(String),
    /// Function in the side table.
    Function(usize),
}

/// Instance signature collected in pass 1.
#[derive(Clone, Debug)]
pub struct InstanceEntry {
    /// Module name of the class.
    pub module: String,
    /// State of the instance.
    pub state: Node,
}

/// Result of pass 1: the root node plus every instance by id.
#[derive(Clone, Debug)]
pub struct Document {
    /// Root node.
    pub root: Node,
    /// Instance signatures by id.
    pub instances: BTreeMap<u64, InstanceEntry>,
    /// Ids referenced by links, in document order.
    pub links: Vec<u64>,
}

impl Document {
    /// Parses signature JSON.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed signatures and for two instance
    /// signatures sharing an id.
    pub fn parse(json: &Json) -> Result<Self> {
        let mut instances = BTreeMap::new();
        let mut links = Vec::new();
        let root = parse_node(json, &mut instances, &mut links)?;
        Ok(Self {
            root,
            instances,
            links,
        })
    }

    /// Checks that every link targets an instance of the document.
    ///
    /// # Errors
    ///
    /// Returns `DanglingLink` for the first link without a target.
    pub fn check_links(&self) -> Result<()> {
        match self.links.iter().find(|id| !self.instances.contains_key(id)) {
            Some(id) => Err(Error::new(ErrorKind::DanglingLink(*id))),
            None => Ok(()),
        }
    }
}

fn parse_node(
    json: &Json,
    instances: &mut BTreeMap<u64, InstanceEntry>,
    links: &mut Vec<u64>,
) -> Result<Node> {
    Ok(match json {
        Json::Array(items) => Node::Array(
            items
                .iter()
                .map(|item| parse_node(item, instances, links))
                .collect::<Result<Vec<_>>>()?,
        ),
        Json::Object(object) => match Tag::name_of(object) {
            Some(name) => {
                let tag = Tag::parse(name)
                    .ok_or_else(|| Error::serialization(format!("unknown signature {name:?}")))?;
                parse_signature(tag, object, instances, links)?
            }
            None => Node::Object(
                object
                    .iter()
                    .map(|(key, item)| {
                        Ok((Arc::from(key.as_str()), parse_node(item, instances, links)?))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
        },
        scalar => Node::Plain(Value::from(scalar.clone())),
    })
}

fn parse_signature(
    tag: Tag,
    object: &serde_json::Map<String, Json>,
    instances: &mut BTreeMap<u64, InstanceEntry>,
    links: &mut Vec<u64>,
) -> Result<Node> {
    Ok(match tag {
        Tag::Instance => {
            let id = required_id(object, tag)?;
            let module = required_module(object, tag)?;
            let state = match object.get(STATE_KEY) {
                Some(state) => parse_node(state, instances, links)?,
                None => Node::Plain(Value::Undefined),
            };
            if instances.insert(id, InstanceEntry { module, state }).is_some() {
                return Err(Error::new(ErrorKind::DuplicateInstance(id)));
            }
            Node::Ref(id)
        }
        Tag::Link => {
            let id = required_id(object, tag)?;
            links.push(id);
            Node::Ref(id)
        }
        Tag::NamedFunction => Node::NamedFunction(required_module(object, tag)?),
        Tag::Function => {
            let id = required_id(object, tag)?;
            let index = usize::try_from(id)
                .map_err(|_| Error::serialization(format!("function index {id} out of range")))?;
            Node::Function(index)
        }
        Tag::PositiveInfinity => Node::Plain(Value::Float(f64::INFINITY)),
        Tag::NegativeInfinity => Node::Plain(Value::Float(f64::NEG_INFINITY)),
        Tag::NaN => Node::Plain(Value::Float(f64::NAN)),
        Tag::Undefined => Node::Plain(Value::Undefined),
    })
}

fn required_id(object: &serde_json::Map<String, Json>, tag: Tag) -> Result<u64> {
    object
        .get(ID_KEY)
        .and_then(Json::as_u64)
        .ok_or_else(|| Error::serialization(format!("{} signature without id", tag.as_str())))
}

fn required_module(object: &serde_json::Map<String, Json>, tag: Tag) -> Result<String> {
    object
        .get(MODULE_KEY)
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::serialization(format!("{} signature without module", tag.as_str())))
}

enum Slot {
    Pending(InstanceEntry),
    InProgress,
    Done(Instance),
}

/// Reference that closes a cycle, restored after every instance exists.
struct Fixup {
    owner: u64,
    path: Vec<PathSegment>,
    target: u64,
}

/// Revives signature JSON through a class registry.
#[derive(Debug)]
pub struct Reviver<'a> {
    registry: &'a ClassRegistry,
    functions: Vec<Callable>,
}

impl<'a> Reviver<'a> {
    /// Creates a reviver resolving classes through `registry`.
    #[must_use]
    pub fn new(registry: &'a ClassRegistry) -> Self {
        Self {
            registry,
            functions: Vec::new(),
        }
    }

    /// Supplies the side table produced by the serializer.
    #[must_use]
    pub fn with_functions(mut self, functions: Vec<Callable>) -> Self {
        self.functions = functions;
        self
    }

    /// Revives JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or revival fails.
    pub fn from_str(&self, text: &str) -> Result<Value> {
        let json: Json =
            serde_json::from_str(text).map_err(|e| Error::serialization(e.to_string()))?;
        self.revive(&json)
    }

    /// Revives `MessagePack` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded or revival fails.
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Value> {
        let json: Json = rmp_serde::from_slice(bytes)
            .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))?;
        self.revive(&json)
    }

    /// Revives a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed signatures, dangling links, duplicate
    /// ids, unresolvable modules and failing class constructors.
    pub fn revive(&self, json: &Json) -> Result<Value> {
        self.revive_document(Document::parse(json)?)
    }

    /// Materializes a parsed document.
    ///
    /// # Errors
    ///
    /// See [`Self::revive`].
    pub fn revive_document(&self, document: Document) -> Result<Value> {
        document.check_links()?;
        debug!(
            instances = document.instances.len(),
            links = document.links.len(),
            "reviving document"
        );

        let mut pass = Pass {
            reviver: self,
            slots: document
                .instances
                .into_iter()
                .map(|(id, entry)| (id, Slot::Pending(entry)))
                .collect(),
            fixups: Vec::new(),
        };
        let mut path = Vec::new();
        let root = pass.materialize(document.root, None, &mut path)?;

        let Pass { slots, fixups, .. } = pass;
        if !fixups.is_empty() {
            debug!(count = fixups.len(), "restoring cyclic references");
        }
        for fixup in fixups {
            let owner = done(&slots, fixup.owner)?;
            let target = done(&slots, fixup.target)?;
            owner
                .object()
                .restore_link(&fixup.path, Value::Instance(target))?;
        }
        Ok(root)
    }
}

fn done(slots: &HashMap<u64, Slot>, id: u64) -> Result<Instance> {
    match slots.get(&id) {
        Some(Slot::Done(instance)) => Ok(instance.clone()),
        Some(_) => Err(Error::internal(format!("instance {id} was never revived"))),
        None => Err(Error::new(ErrorKind::DanglingLink(id))),
    }
}

struct Pass<'r, 'a> {
    reviver: &'r Reviver<'a>,
    slots: HashMap<u64, Slot>,
    fixups: Vec<Fixup>,
}

impl Pass<'_, '_> {
    fn materialize(
        &mut self,
        node: Node,
        owner: Option<u64>,
        path: &mut Vec<PathSegment>,
    ) -> Result<Value> {
        Ok(match node {
            Node::Plain(value) => value,
            Node::Array(items) => {
                let mut out = Array::new();
                for (index, item) in items.into_iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    let value = self.materialize(item, owner, path);
                    path.pop();
                    out.push(value?);
                }
                Value::Array(out)
            }
            Node::Object(entries) => {
                let mut out = Map::new();
                for (key, item) in entries {
                    path.push(PathSegment::Key(key.clone()));
                    let value = self.materialize(item, owner, path);
                    path.pop();
                    out.insert(key, value?);
                }
                Value::Object(out)
            }
            Node::Ref(id) => self.resolve(id, owner, path)?,
            Node::NamedFunction(module) => Value::Function(self.reviver.registry.function(&module)?),
            Node::Function(index) => Value::Function(
                self.reviver
                    .functions
                    .get(index)
                    .cloned()
                    .ok_or_else(|| {
                        Error::new(ErrorKind::UnsupportedFunction(format!(
                            "side table function {index}"
                        )))
                    })?,
            ),
        })
    }

    fn resolve(&mut self, id: u64, owner: Option<u64>, path: &[PathSegment]) -> Result<Value> {
        match self.slots.insert(id, Slot::InProgress) {
            Some(Slot::Done(instance)) => {
                self.slots.insert(id, Slot::Done(instance.clone()));
                Ok(Value::Instance(instance))
            }
            Some(Slot::InProgress) => {
                let owner = owner.ok_or_else(|| {
                    Error::internal(format!("cycle to instance {id} outside any instance"))
                })?;
                self.fixups.push(Fixup {
                    owner,
                    path: path.to_vec(),
                    target: id,
                });
                Ok(Value::Null)
            }
            Some(Slot::Pending(entry)) => {
                let mut own_path = Vec::new();
                let state = self.materialize(entry.state, Some(id), &mut own_path)?;
                let class = self.reviver.registry.class(&entry.module)?;
                let instance = class(state)?;
                self.slots.insert(id, Slot::Done(instance.clone()));
                Ok(Value::Instance(instance))
            }
            None => {
                self.slots.remove(&id);
                Err(Error::new(ErrorKind::DanglingLink(id)))
            }
        }
    }
}

/// Revives JSON text with a registry and no side table.
///
/// # Errors
///
/// See [`Reviver::revive`].
pub fn from_str(text: &str, registry: &ClassRegistry) -> Result<Value> {
    Reviver::new(registry).from_str(text)
}
