//! Heap values and the references that address them.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::dict::Dict;
use crate::native_fn::NativeFn;

/// Reference to a value living in the [`ObjectHeap`](crate::ObjectHeap).
///
/// This is the raw, unmanaged handle of the runtime: copying it does not
/// change any reference count. Whoever holds an *owned* `ObjectRef` is
/// responsible for releasing it exactly once. The generation prevents a
/// stale reference from reaching a value that reused its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Index into the heap's slot table
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
}

impl ObjectRef {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Runtime-visible kind of a value, used by the type-check predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    None,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Tuple,
    Dict,
    Module,
    Function,
}

impl ObjectKind {
    /// Get a human-readable name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::None => "NoneType",
            ObjectKind::Bool => "bool",
            ObjectKind::Int => "int",
            ObjectKind::Float => "float",
            ObjectKind::Str => "str",
            ObjectKind::Bytes => "bytes",
            ObjectKind::List => "list",
            ObjectKind::Tuple => "tuple",
            ObjectKind::Dict => "dict",
            ObjectKind::Module => "module",
            ObjectKind::Function => "builtin_function",
        }
    }

    /// Whether values of this kind can be invoked.
    pub fn is_callable(&self) -> bool {
        matches!(self, ObjectKind::Function)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A module-like namespace: a name plus attribute table.
#[derive(Debug, Default)]
pub struct ModuleData {
    pub name: String,
    pub attrs: FxHashMap<String, ObjectRef>,
}

impl ModuleData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: FxHashMap::default(),
        }
    }
}

/// Payload of a heap slot.
///
/// Container variants hold *owned* references to their elements; releasing
/// the container releases each of them.
pub enum Value {
    None,
    Bool(bool),
    /// Wide enough for every 64-bit signed and unsigned native integer.
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<ObjectRef>),
    Tuple(Vec<ObjectRef>),
    Dict(Dict),
    Module(ModuleData),
    Function(NativeFn),
}

impl Value {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Value::None => ObjectKind::None,
            Value::Bool(_) => ObjectKind::Bool,
            Value::Int(_) => ObjectKind::Int,
            Value::Float(_) => ObjectKind::Float,
            Value::Str(_) => ObjectKind::Str,
            Value::Bytes(_) => ObjectKind::Bytes,
            Value::List(_) => ObjectKind::List,
            Value::Tuple(_) => ObjectKind::Tuple,
            Value::Dict(_) => ObjectKind::Dict,
            Value::Module(_) => ObjectKind::Module,
            Value::Function(_) => ObjectKind::Function,
        }
    }

    /// Consume the value, yielding every reference it owns.
    pub(crate) fn into_children(self) -> Vec<ObjectRef> {
        match self {
            Value::List(items) | Value::Tuple(items) => items,
            Value::Dict(dict) => dict.into_refs(),
            Value::Module(module) => module.attrs.into_values().collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Value::List(items) => write!(f, "List(len={})", items.len()),
            Value::Tuple(items) => write!(f, "Tuple(len={})", items.len()),
            Value::Dict(d) => write!(f, "Dict(len={})", d.len()),
            Value::Module(m) => write!(f, "Module({:?})", m.name),
            Value::Function(func) => write!(f, "Function({:?})", func.name()),
        }
    }
}
