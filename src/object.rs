//! The object facade.
//!
//! An [`Object`] is either *unbound* (the default) or bound to one runtime
//! value through a [`SharedRef`]. Cloning an `Object` shares the reference;
//! the runtime value is released when the last clone is dropped.
//!
//! Every facade operation that can raise leaves the runtime's error
//! indicator cleared, on success and on failure. A raised exception is
//! reported through the returned [`Error`]'s `detail`.

use std::fmt;

use dynwrap_core::{ObjectKind, ObjectRef, Runtime};
use tracing::debug;

use crate::allocate::{Allocatable, fault_on};
use crate::args::IntoArgs;
use crate::convert::{Convertible, convert};
use crate::error::{Error, Result};
use crate::handle::{SharedRef, UniqueRef};

/// Handle to a runtime value, or unbound.
#[derive(Clone, Default)]
pub struct Object {
    handle: Option<SharedRef>,
}

/// Take the pending exception (if any) as a message, clearing the indicator.
fn take_error(rt: &Runtime) -> String {
    rt.err_fetch().map(|e| e.to_string()).unwrap_or_default()
}

impl Object {
    /// Take ownership of an owned reference (no increment).
    pub fn from_owned(rt: &Runtime, ptr: ObjectRef) -> Self {
        Self::from_unique(UniqueRef::from_owned(rt, ptr))
    }

    /// Take a new reference to a borrowed value.
    pub fn from_borrowed(rt: &Runtime, ptr: ObjectRef) -> Self {
        Self::from_unique(UniqueRef::from_borrowed(rt, ptr))
    }

    pub fn from_unique(handle: UniqueRef) -> Self {
        Self {
            handle: Some(handle.into_shared()),
        }
    }

    pub fn from_shared(handle: SharedRef) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Allocate a runtime copy of a native value.
    pub fn from_value<T: Allocatable + ?Sized>(rt: &Runtime, value: &T) -> Self {
        Self::from_unique(value.allocate(rt))
    }

    /// A bound `None`.
    pub fn none(rt: &Runtime) -> Self {
        Self::from_owned(rt, rt.new_none())
    }

    /// Load a module through the runtime's script loader.
    ///
    /// Loading the same path twice yields the same module.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn from_script(rt: &Runtime, path: &str) -> Result<Self> {
        debug!(target: "dynwrap::object", path, "loading script");
        let module = rt.load(path);
        let detail = take_error(rt);
        match module {
            Some(module) => Ok(Self::from_owned(rt, module)),
            None => Err(Error::LoadFailed {
                path: path.to_string(),
                detail,
            }),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    /// The raw reference, still owned by this object.
    pub fn as_ptr(&self) -> Option<ObjectRef> {
        self.handle.as_ref().map(SharedRef::as_ptr)
    }

    pub fn runtime(&self) -> Option<&Runtime> {
        self.handle.as_ref().map(SharedRef::runtime)
    }

    pub fn shared(&self) -> Option<&SharedRef> {
        self.handle.as_ref()
    }

    pub fn kind(&self) -> Option<ObjectKind> {
        let handle = self.handle.as_ref()?;
        handle.runtime().kind(handle.as_ptr())
    }

    pub fn is_none(&self) -> bool {
        self.kind() == Some(ObjectKind::None)
    }

    pub fn is_callable(&self) -> bool {
        self.kind().is_some_and(|k| k.is_callable())
    }

    /// The runtime's reference count of the bound value.
    pub fn ref_count(&self) -> Option<u32> {
        let handle = self.handle.as_ref()?;
        handle.runtime().ref_count(handle.as_ptr())
    }

    /// Identity comparison: both bound to the same runtime value.
    pub fn is(&self, other: &Object) -> bool {
        match (self.as_ptr(), other.as_ptr()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Textual representation; `<unbound>` for an unbound object.
    pub fn repr(&self) -> String {
        match &self.handle {
            Some(handle) => handle.runtime().repr(handle.as_ptr()),
            None => "<unbound>".to_string(),
        }
    }

    /// A new owned reference in `rt` to the bound value; `None` when unbound.
    ///
    /// A raw reference only means something inside the runtime that issued
    /// it, so a value bound to another runtime (or already released) is a
    /// fault.
    pub(crate) fn new_ref_in(&self, rt: &Runtime) -> ObjectRef {
        let Some(handle) = &self.handle else {
            return rt.new_none();
        };
        if !handle.runtime().ptr_eq(rt) {
            fault_on(rt, "passing an object to another runtime");
        }
        if !rt.incref(handle.as_ptr()) {
            fault_on(rt, "referencing a released object");
        }
        handle.as_ptr()
    }

    fn bound(&self, operation: &'static str, name: &str) -> Result<&SharedRef> {
        self.handle.as_ref().ok_or_else(|| Error::Unbound {
            operation,
            name: name.to_string(),
        })
    }

    /// Look up attribute `name`.
    pub fn get_attr(&self, name: &str) -> Result<Object> {
        let handle = self.bound("get attribute", name)?;
        let rt = handle.runtime();
        debug!(target: "dynwrap::object", object = %handle.as_ptr(), attr = name, "get_attr");

        let attr = rt.get_attr(handle.as_ptr(), name);
        let detail = take_error(rt);
        match attr {
            Some(attr) => Ok(Object::from_owned(rt, attr)),
            None => Err(Error::AttributeNotFound {
                name: name.to_string(),
                detail,
            }),
        }
    }

    /// Whether attribute `name` exists. Never fails; `false` when unbound.
    pub fn has_attr(&self, name: &str) -> bool {
        match &self.handle {
            Some(handle) => handle.runtime().has_attr(handle.as_ptr(), name),
            None => false,
        }
    }

    /// Bind attribute `name` to a copy of `value`.
    pub fn set_attr<T: Allocatable + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let handle = self.bound("set attribute", name)?;
        let rt = handle.runtime();
        let value = value.allocate(rt);

        let ok = rt.set_attr(handle.as_ptr(), name, value.as_ptr());
        let detail = take_error(rt);
        if ok {
            Ok(())
        } else {
            Err(Error::AttributeNotSet {
                name: name.to_string(),
                detail,
            })
        }
    }

    /// Call the attribute `name` with positional `args`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call_function<'a>(&self, name: &str, args: impl IntoArgs<'a>) -> Result<Object> {
        let handle = self.bound("call function", name)?;
        let function = self.get_attr(name)?;
        let Some(callable) = function.as_ptr() else {
            return Err(Error::Unbound {
                operation: "call function",
                name: name.to_string(),
            });
        };
        invoke(handle.runtime(), callable, name, args)
    }

    /// Call the bound value itself with positional `args`.
    pub fn call<'a>(&self, args: impl IntoArgs<'a>) -> Result<Object> {
        let handle = self.bound("call", "<object>")?;
        let rt = handle.runtime();
        let name = match rt.with_interpreter(|i| i.function(handle.as_ptr())) {
            Some(function) => function.name().to_string(),
            None => rt.repr(handle.as_ptr()),
        };
        invoke(rt, handle.as_ptr(), &name, args)
    }

    /// Convert the bound value into `out`. Unbound objects never convert.
    pub fn convert<T: Convertible>(&self, out: &mut T) -> bool {
        match &self.handle {
            Some(handle) => convert(handle.runtime(), handle.as_ptr(), out),
            None => false,
        }
    }

    /// By-value form of [`convert`](Self::convert).
    pub fn extract<T: Convertible>(&self) -> Option<T> {
        let handle = self.handle.as_ref()?;
        T::convert_from(handle.runtime(), handle.as_ptr())
    }
}

fn invoke<'a>(
    rt: &Runtime,
    callable: ObjectRef,
    name: &str,
    args: impl IntoArgs<'a>,
) -> Result<Object> {
    let args = args.into_args();
    debug!(target: "dynwrap::object", function = name, argc = args.len(), "call");
    let tuple = args.build(rt);

    let result = rt.call(callable, tuple.as_ptr());
    let detail = take_error(rt);
    match result {
        Some(result) => Ok(Object::from_owned(rt, result)),
        None => Err(Error::CallFailed {
            name: name.to_string(),
            detail,
        }),
    }
}

impl Allocatable for Object {
    /// A new reference to the bound value; `None` when unbound.
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        UniqueRef::from_owned(rt, self.new_ref_in(rt))
    }
}

impl Convertible for Object {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        rt.kind(obj).map(|_| Object::from_borrowed(rt, obj))
    }
}

impl From<UniqueRef> for Object {
    fn from(handle: UniqueRef) -> Self {
        Object::from_unique(handle)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(handle) => f
                .debug_struct("Object")
                .field("ptr", &handle.as_ptr())
                .field("repr", &self.repr())
                .finish(),
            None => f.write_str("Object(<unbound>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use dynwrap_core::Module;

    fn math(rt: &Runtime) -> Object {
        rt.install_module(
            Module::new("math")
                .constant("pi", std::f64::consts::PI)
                .function("add", |ctx| {
                    ctx.expect_args(2)?;
                    let rt = ctx.runtime();
                    let a = rt.as_int(ctx.arg(0)?).unwrap_or_default();
                    let b = rt.as_int(ctx.arg(1)?).unwrap_or_default();
                    Ok(rt.new_int(a + b))
                }),
        );
        Object::from_script(rt, "math").expect("math module loads")
    }

    #[test]
    fn unbound_object_behaviour() {
        let obj = Object::default();

        assert!(!obj.is_bound());
        assert!(!obj.has_attr("x"));
        assert_eq!(obj.get_attr("x").unwrap_err().kind(), ErrorKind::Unbound);
        assert_eq!(
            obj.call_function("f", ()).unwrap_err().kind(),
            ErrorKind::Unbound
        );
        let mut out = 5;
        assert!(!obj.convert(&mut out));
        assert_eq!(out, 5);
        assert_eq!(obj.repr(), "<unbound>");
    }

    #[test]
    fn get_attr_and_extract() {
        let rt = Runtime::new();
        let module = math(&rt);

        let pi = module.get_attr("pi").unwrap();
        assert_eq!(pi.extract::<f64>(), Some(std::f64::consts::PI));
        assert!(rt.err_occurred().is_none());
    }

    #[test]
    fn missing_attribute_reports_detail_and_clears_indicator() {
        let rt = Runtime::new();
        let module = math(&rt);

        let err = module.get_attr("tau").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AttributeNotFound);
        assert_eq!(err.name(), "tau");
        assert!(err.detail().unwrap().contains("has no attribute 'tau'"));
        assert!(rt.err_occurred().is_none());
    }

    #[test]
    fn call_function_with_tuple_args() {
        let rt = Runtime::new();
        let module = math(&rt);

        let sum = module.call_function("add", (2, 40)).unwrap();
        assert_eq!(sum.extract::<i32>(), Some(42));
    }

    #[test]
    fn call_failure_is_call_failed() {
        let rt = Runtime::new();
        let module = math(&rt);

        let err = module.call_function("add", (1,)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CallFailed);
        assert_eq!(err.name(), "add");
        assert_eq!(
            err.detail(),
            Some("TypeError: expected 2 arguments, got 1")
        );
        assert!(rt.err_occurred().is_none());
    }

    #[test]
    fn calling_a_missing_function_is_attribute_not_found() {
        let rt = Runtime::new();
        let module = math(&rt);

        let err = module.call_function("sub", (1, 2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AttributeNotFound);
        assert_eq!(err.name(), "sub");
    }

    #[test]
    fn call_bound_callable() {
        let rt = Runtime::new();
        let module = math(&rt);
        let add = module.get_attr("add").unwrap();

        assert!(add.is_callable());
        assert_eq!(add.call((1, 1)).unwrap().extract::<i64>(), Some(2));

        let pi = module.get_attr("pi").unwrap();
        let err = pi.call(()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CallFailed);
        assert!(err.detail().unwrap().contains("not callable"));
    }

    #[test]
    fn set_attr_on_module_and_non_module() {
        let rt = Runtime::new();
        let module = math(&rt);

        module.set_attr("answer", &42).unwrap();
        assert_eq!(module.get_attr("answer").unwrap().extract::<u8>(), Some(42));

        let number = Object::from_value(&rt, &1);
        let err = number.set_attr("x", &2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AttributeNotSet);
        assert!(rt.err_occurred().is_none());
    }

    #[test]
    fn clones_share_one_reference() {
        let rt = Runtime::new();
        let obj = Object::from_value(&rt, "shared");
        let copy = obj.clone();

        assert!(obj.is(&copy));
        assert_eq!(obj.ref_count(), Some(1));
        assert_eq!(obj.shared().map(SharedRef::holders), Some(2));
    }

    #[test]
    fn script_load_failure() {
        let rt = Runtime::new();
        let err = Object::from_script(&rt, "no/such/script").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadFailed);
        assert_eq!(err.name(), "no/such/script");
        assert!(err.detail().unwrap().starts_with("ImportError"));
        assert!(rt.err_occurred().is_none());
    }

    #[test]
    fn objects_convert_as_objects() {
        let rt = Runtime::new();
        let list = Object::from_value(&rt, &vec![1, 2]);
        let items = list.extract::<Vec<Object>>().unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].extract::<i32>(), Some(2));
        assert_eq!(items[0].ref_count(), Some(2));
    }
}
