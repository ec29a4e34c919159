//! The shared front to the interpreter.
//!
//! A `Runtime` is a cheap, cloneable handle (`Rc`) to one interpreter. It is
//! deliberately `!Send`: all access to the embedded runtime is serialized on
//! the thread that created it.
//!
//! # Re-entrancy
//!
//! Every primitive borrows the interpreter only for its own duration. Native
//! callables are invoked with no borrow held, so they may allocate, call
//! other callables or load scripts. A release requested while the
//! interpreter is busy (a native closure dropped while its function value is
//! being freed) is queued and applied as soon as the borrow ends.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::config::RuntimeConfig;
use crate::error::{Exception, ExceptionKind};
use crate::interpreter::Interpreter;
use crate::loader::{DefaultLoader, ScriptLoader};
use crate::module::Module;
use crate::native_fn::{CallContext, NativeFn};
use crate::value::{ObjectKind, ObjectRef};

struct RuntimeInner {
    interp: RefCell<Interpreter>,
    /// Releases deferred while the interpreter was borrowed.
    pending: RefCell<Vec<ObjectRef>>,
    config: RuntimeConfig,
    loader: RefCell<Rc<dyn ScriptLoader>>,
    modules: RefCell<FxHashMap<String, Module>>,
    /// Loaded modules by path; each entry owns one reference.
    cache: RefCell<FxHashMap<String, ObjectRef>>,
}

/// Handle to an embedded runtime instance.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Start a runtime with the default configuration and loader.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_loader(config, DefaultLoader)
    }

    /// Start a runtime that loads scripts through `loader`.
    pub fn with_loader(config: RuntimeConfig, loader: impl ScriptLoader + 'static) -> Self {
        debug!(search_paths = config.search_paths.len(), "starting runtime");
        Self {
            inner: Rc::new(RuntimeInner {
                interp: RefCell::new(Interpreter::new()),
                pending: RefCell::new(Vec::new()),
                config,
                loader: RefCell::new(Rc::new(loader)),
                modules: RefCell::new(FxHashMap::default()),
                cache: RefCell::new(FxHashMap::default()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Replace the script loader. Already cached modules stay cached.
    pub fn set_loader(&self, loader: impl ScriptLoader + 'static) {
        *self.inner.loader.borrow_mut() = Rc::new(loader);
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn with_ref<R>(&self, f: impl FnOnce(&Interpreter) -> R) -> R {
        f(&*self.inner.interp.borrow())
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut Interpreter) -> R) -> R {
        let result = f(&mut *self.inner.interp.borrow_mut());
        self.flush_pending();
        result
    }

    fn flush_pending(&self) {
        loop {
            let batch = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if batch.is_empty() {
                break;
            }
            let mut interp = self.inner.interp.borrow_mut();
            for obj in batch {
                interp.decref(obj);
            }
        }
    }

    /// Run `f` with shared access to the interpreter.
    ///
    /// Useful for reading borrowed data (strings, element slices) without
    /// copying it out.
    pub fn with_interpreter<R>(&self, f: impl FnOnce(&Interpreter) -> R) -> R {
        self.with_ref(f)
    }

    // =========================================================================
    // CONSTRUCTORS (new owned references)
    // =========================================================================

    pub fn new_none(&self) -> ObjectRef {
        self.with_mut(|i| i.new_none())
    }

    pub fn new_bool(&self, value: bool) -> ObjectRef {
        self.with_mut(|i| i.new_bool(value))
    }

    pub fn new_int(&self, value: i128) -> ObjectRef {
        self.with_mut(|i| i.new_int(value))
    }

    pub fn new_float(&self, value: f64) -> ObjectRef {
        self.with_mut(|i| i.new_float(value))
    }

    pub fn new_str(&self, value: &str) -> ObjectRef {
        self.with_mut(|i| i.new_str(value))
    }

    pub fn new_bytes(&self, value: &[u8]) -> ObjectRef {
        self.with_mut(|i| i.new_bytes(value))
    }

    pub fn list_new(&self, len: usize) -> ObjectRef {
        self.with_mut(|i| i.list_new(len))
    }

    pub fn tuple_new(&self, len: usize) -> ObjectRef {
        self.with_mut(|i| i.tuple_new(len))
    }

    pub fn dict_new(&self) -> ObjectRef {
        self.with_mut(|i| i.dict_new())
    }

    pub fn module_new(&self, name: &str) -> ObjectRef {
        self.with_mut(|i| i.module_new(name))
    }

    pub fn new_function(&self, function: NativeFn) -> ObjectRef {
        self.with_mut(|i| i.new_function(function))
    }

    // =========================================================================
    // REFERENCE COUNTING
    // =========================================================================

    pub fn incref(&self, obj: ObjectRef) -> bool {
        self.with_mut(|i| i.incref(obj))
    }

    /// Release one reference.
    ///
    /// Safe to call from a destructor that runs while the interpreter is
    /// busy; the release is then deferred.
    pub fn release(&self, obj: ObjectRef) {
        match self.inner.interp.try_borrow_mut() {
            Ok(mut interp) => {
                interp.decref(obj);
                drop(interp);
                self.flush_pending();
            }
            Err(_) => {
                trace!(object = %obj, "deferring release");
                self.inner.pending.borrow_mut().push(obj);
            }
        }
    }

    pub fn ref_count(&self, obj: ObjectRef) -> Option<u32> {
        self.with_ref(|i| i.ref_count(obj))
    }

    /// Number of live values, including the `None` singleton.
    pub fn live_objects(&self) -> usize {
        self.with_ref(|i| i.live_objects())
    }

    // =========================================================================
    // TYPE CHECKS AND READERS
    // =========================================================================

    pub fn kind(&self, obj: ObjectRef) -> Option<ObjectKind> {
        self.with_ref(|i| i.kind(obj))
    }

    pub fn is_none(&self, obj: ObjectRef) -> bool {
        self.with_ref(|i| i.is_none(obj))
    }

    pub fn is_callable(&self, obj: ObjectRef) -> bool {
        self.with_ref(|i| i.is_callable(obj))
    }

    pub fn as_bool(&self, obj: ObjectRef) -> Option<bool> {
        self.with_ref(|i| i.as_bool(obj))
    }

    pub fn as_int(&self, obj: ObjectRef) -> Option<i128> {
        self.with_ref(|i| i.as_int(obj))
    }

    pub fn as_float(&self, obj: ObjectRef) -> Option<f64> {
        self.with_ref(|i| i.as_float(obj))
    }

    pub fn as_str(&self, obj: ObjectRef) -> Option<String> {
        self.with_ref(|i| i.as_str(obj).map(str::to_owned))
    }

    pub fn as_bytes(&self, obj: ObjectRef) -> Option<Vec<u8>> {
        self.with_ref(|i| i.as_bytes(obj).map(<[u8]>::to_vec))
    }

    /// Borrowed element references of a list.
    pub fn list_items(&self, obj: ObjectRef) -> Option<Vec<ObjectRef>> {
        self.with_ref(|i| i.list_items(obj).map(<[ObjectRef]>::to_vec))
    }

    /// Borrowed element references of a tuple.
    pub fn tuple_items(&self, obj: ObjectRef) -> Option<Vec<ObjectRef>> {
        self.with_ref(|i| i.tuple_items(obj).map(<[ObjectRef]>::to_vec))
    }

    /// Borrowed `(key, value)` references of a dict.
    pub fn dict_items(&self, obj: ObjectRef) -> Option<Vec<(ObjectRef, ObjectRef)>> {
        self.with_ref(|i| i.dict_items(obj))
    }

    /// Borrowed reference to the value stored under `key`.
    pub fn dict_get(&self, dict: ObjectRef, key: ObjectRef) -> Option<ObjectRef> {
        self.with_ref(|i| i.dict_get(dict, key))
    }

    pub fn len(&self, obj: ObjectRef) -> Option<usize> {
        self.with_ref(|i| i.len(obj))
    }

    // =========================================================================
    // SETTERS
    // =========================================================================

    /// Steals `item`.
    pub fn list_set_item(&self, list: ObjectRef, index: usize, item: ObjectRef) -> bool {
        self.with_mut(|i| i.list_set_item(list, index, item))
    }

    /// Steals `item`.
    pub fn tuple_set_item(&self, tuple: ObjectRef, index: usize, item: ObjectRef) -> bool {
        self.with_mut(|i| i.tuple_set_item(tuple, index, item))
    }

    pub fn list_append(&self, list: ObjectRef, item: ObjectRef) -> bool {
        self.with_mut(|i| i.list_append(list, item))
    }

    pub fn dict_set_item(&self, dict: ObjectRef, key: ObjectRef, value: ObjectRef) -> bool {
        self.with_mut(|i| i.dict_set_item(dict, key, value))
    }

    pub fn set_attr(&self, obj: ObjectRef, name: &str, value: ObjectRef) -> bool {
        self.with_mut(|i| i.set_attr(obj, name, value))
    }

    // =========================================================================
    // ATTRIBUTES AND CALLS
    // =========================================================================

    /// New reference to an attribute; raises `AttributeError` when missing.
    pub fn get_attr(&self, obj: ObjectRef, name: &str) -> Option<ObjectRef> {
        debug!(object = %obj, attr = name, "get_attr");
        self.with_mut(|i| i.get_attr(obj, name))
    }

    pub fn has_attr(&self, obj: ObjectRef, name: &str) -> bool {
        self.with_ref(|i| i.has_attr(obj, name))
    }

    pub fn attr_names(&self, obj: ObjectRef) -> Vec<String> {
        self.with_ref(|i| i.attr_names(obj))
    }

    /// Invoke `callable` with the positional arguments in `args` (a tuple).
    ///
    /// Returns a new owned reference to the result, or `None` with the
    /// error indicator set.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&self, callable: ObjectRef, args: ObjectRef) -> Option<ObjectRef> {
        let (function, argv, kind) = self.with_ref(|i| {
            (
                i.function(callable),
                i.tuple_items(args).map(<[ObjectRef]>::to_vec),
                i.kind(callable),
            )
        });

        let Some(function) = function else {
            let kind = kind.map_or("<released>", |k| k.name());
            self.raise(Exception::type_error(format!(
                "'{}' object is not callable",
                kind
            )));
            return None;
        };
        let Some(argv) = argv else {
            self.raise(Exception::type_error("call arguments must be a tuple"));
            return None;
        };

        debug!(function = function.name(), argc = argv.len(), "call");
        // Keep the arguments alive even if the callee drops its caller's handles.
        self.incref(args);
        let result = {
            let mut ctx = CallContext::new(self, function.name(), &argv);
            function.call(&mut ctx)
        };
        self.release(args);

        match result {
            Ok(obj) => Some(obj),
            Err(err) => {
                let exc = err.into_exception();
                debug!(function = function.name(), error = %exc, "native call failed");
                self.raise(exc);
                None
            }
        }
    }

    // =========================================================================
    // MODULES AND SCRIPTS
    // =========================================================================

    /// Register a native module, loadable by its name.
    pub fn install_module(&self, module: Module) {
        debug!(module = module.name(), "installing module");
        self.inner
            .modules
            .borrow_mut()
            .insert(module.name().to_string(), module);
    }

    pub fn installed_module(&self, name: &str) -> Option<Module> {
        self.inner.modules.borrow().get(name).cloned()
    }

    /// Load the module at `path` through the script loader.
    ///
    /// A module is loaded once per runtime; later loads of the same path
    /// return the same module. On failure the error indicator holds an
    /// `ImportError` (or the exception raised while evaluating).
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn load(&self, path: &str) -> Option<ObjectRef> {
        let cached = self.inner.cache.borrow().get(path).copied();
        if let Some(module) = cached {
            trace!(path, "module cache hit");
            self.incref(module);
            return Some(module);
        }

        let loader = Rc::clone(&self.inner.loader.borrow());
        match loader.load(self, path) {
            Ok(module) => {
                debug!(path, module = %module, "loaded");
                self.incref(module);
                self.inner
                    .cache
                    .borrow_mut()
                    .insert(path.to_string(), module);
                Some(module)
            }
            Err(err) => {
                warn!(path, error = %err, "load failed");
                self.raise(err.into_exception());
                None
            }
        }
    }

    /// Drop every cached module reference.
    pub fn clear_cache(&self) {
        let cached: Vec<_> = self.inner.cache.borrow_mut().drain().map(|(_, m)| m).collect();
        for module in cached {
            self.release(module);
        }
    }

    // =========================================================================
    // ERROR INDICATOR
    // =========================================================================

    pub fn raise(&self, exc: Exception) {
        self.with_mut(|i| i.raise(exc));
    }

    pub fn raise_kind(&self, kind: ExceptionKind, message: impl Into<String>) {
        self.raise(Exception::new(kind, message));
    }

    /// Copy of the pending exception, if any.
    pub fn err_occurred(&self) -> Option<Exception> {
        self.with_ref(|i| i.err_occurred().cloned())
    }

    pub fn err_fetch(&self) -> Option<Exception> {
        self.with_mut(|i| i.err_fetch())
    }

    pub fn err_clear(&self) {
        self.with_mut(|i| i.err_clear());
    }

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    pub fn repr(&self, obj: ObjectRef) -> String {
        self.with_ref(|i| i.repr(obj))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("live_objects", &self.live_objects())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
