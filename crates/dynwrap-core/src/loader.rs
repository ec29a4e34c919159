//! Script loading.
//!
//! A [`ScriptLoader`] turns a path into a module value. The
//! [`DefaultLoader`] first looks for a native module installed under that
//! name, then for a TOML data file on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::LoadError;
use crate::runtime::Runtime;
use crate::value::ObjectRef;

/// Factory contract: produce a module value for `path`.
///
/// On success the loader returns a new owned reference.
pub trait ScriptLoader {
    fn load(&self, rt: &Runtime, path: &str) -> Result<ObjectRef, LoadError>;
}

impl<F> ScriptLoader for F
where
    F: Fn(&Runtime, &str) -> Result<ObjectRef, LoadError>,
{
    fn load(&self, rt: &Runtime, path: &str) -> Result<ObjectRef, LoadError> {
        (self)(rt, path)
    }
}

/// Loader for installed native modules and TOML data modules.
///
/// Every top-level key of a TOML file becomes a module attribute. Arrays
/// become lists, tables become string-keyed dicts and datetimes are kept
/// as their string form.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoader;

impl DefaultLoader {
    /// Files tried for `path`, in order.
    fn candidates(rt: &Runtime, path: &str) -> Vec<PathBuf> {
        let config = rt.config();
        let requested = Path::new(path);
        let with_extension = (requested.extension().is_none()
            && !config.script_extension.is_empty())
        .then(|| requested.with_extension(&config.script_extension));

        let mut candidates = vec![requested.to_path_buf()];
        candidates.extend(with_extension.clone());
        if requested.is_relative() {
            for dir in &config.search_paths {
                candidates.push(dir.join(requested));
                if let Some(ext) = &with_extension {
                    candidates.push(dir.join(ext));
                }
            }
        }
        candidates
    }

    fn load_file(rt: &Runtime, file: &Path) -> Result<ObjectRef, LoadError> {
        let source = fs::read_to_string(file).map_err(|source| LoadError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        let table: toml::Table = source.parse().map_err(|e: toml::de::Error| {
            LoadError::Parse {
                path: file.to_path_buf(),
                message: e.message().to_string(),
            }
        })?;

        let name = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let module = rt.module_new(name);
        let module = release_on_error(rt, module, || {
            for (key, value) in &table {
                let attr = toml_to_object(rt, file, value)?;
                let ok = rt.set_attr(module, key, attr);
                rt.release(attr);
                if !ok {
                    return Err(refused(rt, file, "set attribute"));
                }
            }
            Ok(())
        })?;
        debug!(path = %file.display(), attrs = table.len(), "loaded data module");
        Ok(module)
    }
}

impl ScriptLoader for DefaultLoader {
    fn load(&self, rt: &Runtime, path: &str) -> Result<ObjectRef, LoadError> {
        if let Some(module) = rt.installed_module(path) {
            debug!(module = path, "instantiating native module");
            return Ok(module.instantiate(rt));
        }

        match Self::candidates(rt, path).into_iter().find(|c| c.is_file()) {
            Some(file) => Self::load_file(rt, &file),
            None => Err(LoadError::NotFound(path.to_string())),
        }
    }
}

/// Build a runtime value from a TOML value. Returns a new owned reference.
fn toml_to_object(
    rt: &Runtime,
    file: &Path,
    value: &toml::Value,
) -> Result<ObjectRef, LoadError> {
    let obj = match value {
        toml::Value::String(s) => rt.new_str(s),
        toml::Value::Integer(i) => rt.new_int((*i).into()),
        toml::Value::Float(f) => rt.new_float(*f),
        toml::Value::Boolean(b) => rt.new_bool(*b),
        toml::Value::Datetime(dt) => rt.new_str(&dt.to_string()),
        toml::Value::Array(items) => {
            let list = rt.list_new(items.len());
            release_on_error(rt, list, || {
                for (i, item) in items.iter().enumerate() {
                    let item = toml_to_object(rt, file, item)?;
                    if !rt.list_set_item(list, i, item) {
                        return Err(refused(rt, file, "list item assignment"));
                    }
                }
                Ok(())
            })?
        }
        toml::Value::Table(table) => {
            let dict = rt.dict_new();
            release_on_error(rt, dict, || {
                for (key, item) in table {
                    let item = toml_to_object(rt, file, item)?;
                    let key = rt.new_str(key);
                    let ok = rt.dict_set_item(dict, key, item);
                    rt.release(key);
                    rt.release(item);
                    if !ok {
                        return Err(refused(rt, file, "dict item assignment"));
                    }
                }
                Ok(())
            })?
        }
    };
    Ok(obj)
}

/// Run `fill` on a freshly built container, releasing it if `fill` fails.
fn release_on_error(
    rt: &Runtime,
    container: ObjectRef,
    fill: impl FnOnce() -> Result<(), LoadError>,
) -> Result<ObjectRef, LoadError> {
    match fill() {
        Ok(()) => Ok(container),
        Err(err) => {
            rt.release(container);
            Err(err)
        }
    }
}

/// Load error for a primitive the runtime refused, taking its pending
/// exception.
fn refused(rt: &Runtime, file: &Path, operation: &str) -> LoadError {
    let detail = rt
        .err_fetch()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no exception set".to_string());
    LoadError::Build {
        path: file.to_path_buf(),
        detail: format!("{operation}: {detail}"),
    }
}
