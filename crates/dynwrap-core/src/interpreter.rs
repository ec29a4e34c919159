//! Object-model primitives over the heap, plus the error indicator.
//!
//! Every constructor returns a new *owned* reference. Readers return
//! borrowed references that stay valid as long as the container they were
//! read from is alive and unmodified. Nothing in this module runs native
//! callables; invocation lives on [`Runtime`](crate::Runtime).

use std::fmt::Write as _;

use tracing::trace;

use crate::dict::{Dict, DictKey};
use crate::error::{Exception, ExceptionKind};
use crate::heap::ObjectHeap;
use crate::native_fn::NativeFn;
use crate::value::{ModuleData, ObjectKind, ObjectRef, Value};

/// Nesting limit for `repr` and key hashing; self-referencing containers
/// are cut off here instead of recursing forever.
const MAX_NESTING: usize = 64;

/// The embedded runtime's object model.
#[derive(Debug)]
pub struct Interpreter {
    heap: ObjectHeap,
    none: ObjectRef,
    error: Option<Exception>,
}

impl Interpreter {
    pub fn new() -> Self {
        let mut heap = ObjectHeap::new();
        let none = heap.allocate(Value::None);
        heap.make_immortal(none);
        Self {
            heap,
            none,
            error: None,
        }
    }

    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    fn alloc(&mut self, value: Value) -> ObjectRef {
        let obj = self.heap.allocate(value);
        trace!(object = %obj, "allocated");
        obj
    }

    // =========================================================================
    // CONSTRUCTORS
    // =========================================================================

    /// New reference to the `None` singleton.
    pub fn new_none(&mut self) -> ObjectRef {
        self.heap.add_ref(self.none);
        self.none
    }

    pub fn new_bool(&mut self, value: bool) -> ObjectRef {
        self.alloc(Value::Bool(value))
    }

    pub fn new_int(&mut self, value: i128) -> ObjectRef {
        self.alloc(Value::Int(value))
    }

    pub fn new_float(&mut self, value: f64) -> ObjectRef {
        self.alloc(Value::Float(value))
    }

    pub fn new_str(&mut self, value: &str) -> ObjectRef {
        self.alloc(Value::Str(value.to_owned()))
    }

    /// Copies exactly `value.len()` bytes; embedded zero bytes are kept.
    pub fn new_bytes(&mut self, value: &[u8]) -> ObjectRef {
        self.alloc(Value::Bytes(value.to_vec()))
    }

    /// New list of `len` slots, each holding `None` until set.
    pub fn list_new(&mut self, len: usize) -> ObjectRef {
        let items = (0..len).map(|_| self.new_none()).collect();
        self.alloc(Value::List(items))
    }

    /// New tuple of `len` slots, each holding `None` until set.
    pub fn tuple_new(&mut self, len: usize) -> ObjectRef {
        let items = (0..len).map(|_| self.new_none()).collect();
        self.alloc(Value::Tuple(items))
    }

    pub fn dict_new(&mut self) -> ObjectRef {
        self.alloc(Value::Dict(Dict::new()))
    }

    pub fn module_new(&mut self, name: &str) -> ObjectRef {
        self.alloc(Value::Module(ModuleData::new(name)))
    }

    pub fn new_function(&mut self, function: NativeFn) -> ObjectRef {
        self.alloc(Value::Function(function))
    }

    // =========================================================================
    // REFERENCE COUNTING
    // =========================================================================

    pub fn incref(&mut self, obj: ObjectRef) -> bool {
        self.heap.add_ref(obj)
    }

    /// Release one reference; returns the number of values freed.
    pub fn decref(&mut self, obj: ObjectRef) -> usize {
        let freed = self.heap.release(obj);
        if freed > 0 {
            trace!(object = %obj, freed, "released");
        }
        freed
    }

    pub fn ref_count(&self, obj: ObjectRef) -> Option<u32> {
        self.heap.ref_count(obj)
    }

    pub fn live_objects(&self) -> usize {
        self.heap.live_count()
    }

    // =========================================================================
    // TYPE CHECKS
    // =========================================================================

    /// Kind of a live value, `None` for a stale reference.
    pub fn kind(&self, obj: ObjectRef) -> Option<ObjectKind> {
        self.heap.get(obj).map(Value::kind)
    }

    fn is(&self, obj: ObjectRef, kind: ObjectKind) -> bool {
        self.kind(obj) == Some(kind)
    }

    pub fn is_none(&self, obj: ObjectRef) -> bool {
        self.is(obj, ObjectKind::None)
    }

    pub fn is_bool(&self, obj: ObjectRef) -> bool {
        self.is(obj, ObjectKind::Bool)
    }

    pub fn is_int(&self, obj: ObjectRef) -> bool {
        self.is(obj, ObjectKind::Int)
    }

    pub fn is_float(&self, obj: ObjectRef) -> bool {
        self.is(obj, ObjectKind::Float)
    }

    pub fn is_str(&self, obj: ObjectRef) -> bool {
        self.is(obj, ObjectKind::Str)
    }

    pub fn is_bytes(&self, obj: ObjectRef) -> bool {
        self.is(obj, ObjectKind::Bytes)
    }

    pub fn is_list(&self, obj: ObjectRef) -> bool {
        self.is(obj, ObjectKind::List)
    }

    pub fn is_tuple(&self, obj: ObjectRef) -> bool {
        self.is(obj, ObjectKind::Tuple)
    }

    pub fn is_dict(&self, obj: ObjectRef) -> bool {
        self.is(obj, ObjectKind::Dict)
    }

    pub fn is_callable(&self, obj: ObjectRef) -> bool {
        self.kind(obj).is_some_and(|k| k.is_callable())
    }

    // =========================================================================
    // READERS
    // =========================================================================

    pub fn as_bool(&self, obj: ObjectRef) -> Option<bool> {
        match self.heap.get(obj)? {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self, obj: ObjectRef) -> Option<i128> {
        match self.heap.get(obj)? {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self, obj: ObjectRef) -> Option<f64> {
        match self.heap.get(obj)? {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self, obj: ObjectRef) -> Option<&str> {
        match self.heap.get(obj)? {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self, obj: ObjectRef) -> Option<&[u8]> {
        match self.heap.get(obj)? {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Borrowed element references of a list.
    pub fn list_items(&self, obj: ObjectRef) -> Option<&[ObjectRef]> {
        match self.heap.get(obj)? {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrowed element references of a tuple.
    pub fn tuple_items(&self, obj: ObjectRef) -> Option<&[ObjectRef]> {
        match self.heap.get(obj)? {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Borrowed `(key, value)` references of a dict, in unspecified order.
    pub fn dict_items(&self, obj: ObjectRef) -> Option<Vec<(ObjectRef, ObjectRef)>> {
        match self.heap.get(obj)? {
            Value::Dict(dict) => Some(dict.items().collect()),
            _ => None,
        }
    }

    /// Borrowed reference to the value stored under `key` in a dict.
    pub fn dict_get(&self, dict: ObjectRef, key: ObjectRef) -> Option<ObjectRef> {
        let key = self.dict_key(key)?;
        match self.heap.get(dict)? {
            Value::Dict(d) => d.get(&key),
            _ => None,
        }
    }

    /// Length of a str, bytes, list, tuple or dict.
    pub fn len(&self, obj: ObjectRef) -> Option<usize> {
        match self.heap.get(obj)? {
            Value::Str(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::List(items) | Value::Tuple(items) => Some(items.len()),
            Value::Dict(d) => Some(d.len()),
            _ => None,
        }
    }

    /// Clone of the native function behind a callable value.
    pub fn function(&self, obj: ObjectRef) -> Option<NativeFn> {
        match self.heap.get(obj)? {
            Value::Function(f) => Some(f.clone()),
            _ => None,
        }
    }

    /// Hashable image of a value, `None` if the value cannot be a dict key.
    pub fn dict_key(&self, obj: ObjectRef) -> Option<DictKey> {
        self.dict_key_at(obj, 0)
    }

    fn dict_key_at(&self, obj: ObjectRef, depth: usize) -> Option<DictKey> {
        if depth > MAX_NESTING {
            return None;
        }
        Some(match self.heap.get(obj)? {
            Value::None => DictKey::None,
            Value::Bool(v) => DictKey::Bool(*v),
            Value::Int(v) => DictKey::Int(*v),
            Value::Float(v) => DictKey::float(*v),
            Value::Str(s) => DictKey::Str(s.clone()),
            Value::Bytes(b) => DictKey::Bytes(b.clone()),
            Value::Tuple(items) => DictKey::Tuple(
                items
                    .iter()
                    .map(|item| self.dict_key_at(*item, depth + 1))
                    .collect::<Option<Vec<_>>>()?,
            ),
            _ => return None,
        })
    }

    // =========================================================================
    // SETTERS
    // =========================================================================

    /// Store `item` at `index` of a list. Steals the reference to `item`,
    /// even on failure.
    pub fn list_set_item(&mut self, list: ObjectRef, index: usize, item: ObjectRef) -> bool {
        self.sequence_set_item(list, ObjectKind::List, index, item)
    }

    /// Store `item` at `index` of a tuple. Steals the reference to `item`,
    /// even on failure.
    pub fn tuple_set_item(&mut self, tuple: ObjectRef, index: usize, item: ObjectRef) -> bool {
        self.sequence_set_item(tuple, ObjectKind::Tuple, index, item)
    }

    fn sequence_set_item(
        &mut self,
        seq: ObjectRef,
        expected: ObjectKind,
        index: usize,
        item: ObjectRef,
    ) -> bool {
        let outcome = match self.heap.get_mut(seq) {
            Some(Value::List(items)) if expected == ObjectKind::List => {
                Self::replace_slot(items, index, item)
            }
            Some(Value::Tuple(items)) if expected == ObjectKind::Tuple => {
                Self::replace_slot(items, index, item)
            }
            Some(other) => Err(Exception::type_error(format!(
                "expected {}, got {}",
                expected.name(),
                other.kind().name()
            ))),
            None => Err(Exception::runtime_error(format!(
                "stale reference {}",
                seq
            ))),
        };

        match outcome {
            Ok(old) => {
                self.decref(old);
                true
            }
            Err(exc) => {
                self.decref(item);
                self.raise(exc);
                false
            }
        }
    }

    fn replace_slot(
        items: &mut [ObjectRef],
        index: usize,
        item: ObjectRef,
    ) -> Result<ObjectRef, Exception> {
        let len = items.len();
        match items.get_mut(index) {
            Some(slot) => Ok(std::mem::replace(slot, item)),
            None => Err(Exception::new(
                ExceptionKind::IndexError,
                format!("assignment index {} out of range (len {})", index, len),
            )),
        }
    }

    /// Append `item` to a list. Does not steal the reference.
    pub fn list_append(&mut self, list: ObjectRef, item: ObjectRef) -> bool {
        if !self.heap.contains(item) {
            self.raise(Exception::runtime_error(format!("stale reference {}", item)));
            return false;
        }
        match self.heap.get_mut(list) {
            Some(Value::List(items)) => items.push(item),
            _ => {
                self.raise(Exception::type_error("append target is not a list"));
                return false;
            }
        }
        self.heap.add_ref(item);
        true
    }

    /// Insert or replace an entry of a dict. Does not steal the references.
    pub fn dict_set_item(&mut self, dict: ObjectRef, key: ObjectRef, value: ObjectRef) -> bool {
        let Some(hashable) = self.dict_key(key) else {
            let kind = self.kind(key).map_or("<released>", |k| k.name());
            self.raise(Exception::type_error(format!("unhashable type: '{}'", kind)));
            return false;
        };
        if !self.heap.contains(value) {
            self.raise(Exception::runtime_error(format!("stale reference {}", value)));
            return false;
        }

        let replaced = match self.heap.get_mut(dict) {
            Some(Value::Dict(d)) => d.insert(hashable, key, value),
            _ => {
                self.raise(Exception::type_error("item assignment target is not a dict"));
                return false;
            }
        };
        self.heap.add_ref(key);
        self.heap.add_ref(value);
        if let Some((old_key, old_value)) = replaced {
            self.decref(old_key);
            self.decref(old_value);
        }
        true
    }

    /// Bind an attribute on a module. Does not steal the reference.
    pub fn set_attr(&mut self, obj: ObjectRef, name: &str, value: ObjectRef) -> bool {
        if !self.heap.contains(value) {
            self.raise(Exception::runtime_error(format!("stale reference {}", value)));
            return false;
        }
        let replaced = match self.heap.get_mut(obj) {
            Some(Value::Module(module)) => module.attrs.insert(name.to_owned(), value),
            Some(other) => {
                let kind = other.kind();
                self.raise(Exception::attribute_error(format!(
                    "'{}' object attribute '{}' is read-only",
                    kind, name
                )));
                return false;
            }
            None => {
                self.raise(Exception::runtime_error(format!("stale reference {}", obj)));
                return false;
            }
        };
        self.heap.add_ref(value);
        if let Some(old) = replaced {
            self.decref(old);
        }
        true
    }

    // =========================================================================
    // ATTRIBUTES
    // =========================================================================

    fn lookup_attr(&self, obj: ObjectRef, name: &str) -> Result<Option<ObjectRef>, Exception> {
        match self.heap.get(obj) {
            Some(Value::Module(module)) => Ok(module.attrs.get(name).copied()),
            Some(_) => Ok(None),
            None => Err(Exception::runtime_error(format!("stale reference {}", obj))),
        }
    }

    /// New reference to attribute `name`, raising `AttributeError` if it
    /// does not exist.
    pub fn get_attr(&mut self, obj: ObjectRef, name: &str) -> Option<ObjectRef> {
        match self.lookup_attr(obj, name) {
            Ok(Some(attr)) => {
                self.heap.add_ref(attr);
                Some(attr)
            }
            Ok(None) => {
                let message = match self.heap.get(obj) {
                    Some(Value::Module(module)) => {
                        format!("module '{}' has no attribute '{}'", module.name, name)
                    }
                    other => format!(
                        "'{}' object has no attribute '{}'",
                        other.map_or("<released>", |v| v.kind().name()),
                        name
                    ),
                };
                self.raise(Exception::attribute_error(message));
                None
            }
            Err(exc) => {
                self.raise(exc);
                None
            }
        }
    }

    /// Whether attribute `name` exists. Never raises.
    pub fn has_attr(&self, obj: ObjectRef, name: &str) -> bool {
        matches!(self.lookup_attr(obj, name), Ok(Some(_)))
    }

    /// Names of a module's attributes, sorted.
    pub fn attr_names(&self, obj: ObjectRef) -> Vec<String> {
        match self.heap.get(obj) {
            Some(Value::Module(module)) => {
                let mut names: Vec<_> = module.attrs.keys().cloned().collect();
                names.sort();
                names
            }
            _ => Vec::new(),
        }
    }

    // =========================================================================
    // ERROR INDICATOR
    // =========================================================================

    /// Set the error indicator, replacing any pending exception.
    pub fn raise(&mut self, exc: Exception) {
        trace!(kind = %exc.kind, message = %exc.message, "raised");
        self.error = Some(exc);
    }

    pub fn err_occurred(&self) -> Option<&Exception> {
        self.error.as_ref()
    }

    /// Take the pending exception, clearing the indicator.
    pub fn err_fetch(&mut self) -> Option<Exception> {
        self.error.take()
    }

    pub fn err_clear(&mut self) {
        self.error = None;
    }

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    /// Textual representation of a value.
    pub fn repr(&self, obj: ObjectRef) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, obj, 0);
        out
    }

    fn write_repr(&self, out: &mut String, obj: ObjectRef, depth: usize) {
        if depth > MAX_NESTING {
            out.push_str("...");
            return;
        }
        let Some(value) = self.heap.get(obj) else {
            let _ = write!(out, "<released {}>", obj);
            return;
        };
        match value {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(v) => {
                let _ = write!(out, "{}", v);
            }
            Value::Float(v) => {
                let _ = write!(out, "{:?}", v);
            }
            Value::Str(s) => {
                let _ = write!(out, "'{}'", s.escape_default());
            }
            Value::Bytes(b) => {
                out.push_str("b'");
                for byte in b {
                    let _ = write!(out, "{}", std::ascii::escape_default(*byte));
                }
                out.push('\'');
            }
            Value::List(items) => {
                out.push('[');
                self.write_items(out, items, depth);
                out.push(']');
            }
            Value::Tuple(items) => {
                out.push('(');
                self.write_items(out, items, depth);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(dict) => {
                out.push('{');
                for (i, (k, v)) in dict.items().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_repr(out, k, depth + 1);
                    out.push_str(": ");
                    self.write_repr(out, v, depth + 1);
                }
                out.push('}');
            }
            Value::Module(module) => {
                let _ = write!(out, "<module '{}'>", module.name);
            }
            Value::Function(func) => {
                let _ = write!(out, "<built-in function {}>", func.name());
            }
        }
    }

    fn write_items(&self, out: &mut String, items: &[ObjectRef], depth: usize) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_repr(out, *item, depth + 1);
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
