//! The module protocol: loading host function bundles and marshalling
//! values across the host boundary.
//!
//! A program's `from M import a, b` statements are collected before
//! evaluation starts; each distinct module is fetched once through the
//! [`ModuleLoader`] and cached for the life of the registry, and every
//! imported name binds individually in the global frame as a
//! [`Value::Foreign`] wrapper. `FromImport` is a no-op at machine time.

pub(crate) mod math;
pub(crate) mod random_mod;

use std::rc::Rc;

use ahash::AHashMap;

use crate::{
    ast::{Module, Stmt, StmtKind},
    errors::{Error, ErrorKind, EvalResult},
    machine::Context,
    object::Object,
    token::CodeRange,
    value::Value,
};

/// A host-side function exposed to interpreted code.
pub type HostFunction = Rc<dyn Fn(&[Object]) -> Result<Object, String>>;

/// Resolves module names to bundles of named host functions.
///
/// The fetch mechanism (network, filesystem, in-process tables) is the
/// host's business; errors surface to user code as
/// `ModuleConnectionError`.
pub trait ModuleLoader {
    fn load(&mut self, module: &str) -> Result<Vec<(String, HostFunction)>, String>;
}

/// Loader for hosts without modules: every import fails.
#[derive(Debug, Default)]
pub struct NoModules;

impl ModuleLoader for NoModules {
    fn load(&mut self, _module: &str) -> Result<Vec<(String, HostFunction)>, String> {
        Err("no module loader is configured".to_owned())
    }
}

/// Index of a foreign function in the [`ForeignFunctions`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ForeignId(u32);

/// An imported host function with its Python-visible name.
pub(crate) struct ForeignFunction {
    pub name: String,
    pub func: HostFunction,
}

impl std::fmt::Debug for ForeignFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ForeignFunction({})", self.name)
    }
}

/// Arena of every foreign function imported during a context's lifetime.
#[derive(Debug, Default)]
pub(crate) struct ForeignFunctions {
    items: Vec<ForeignFunction>,
}

impl ForeignFunctions {
    pub fn alloc(&mut self, function: ForeignFunction) -> ForeignId {
        let id = ForeignId(u32::try_from(self.items.len()).expect("foreign arena overflow"));
        self.items.push(function);
        id
    }

    pub fn get(&self, id: ForeignId) -> &ForeignFunction {
        &self.items[id.0 as usize]
    }
}

/// Write-once cache of loaded modules plus the loader behind it.
pub(crate) struct ModuleRegistry<L> {
    loader: L,
    cache: AHashMap<String, AHashMap<String, HostFunction>>,
}

impl<L: ModuleLoader> ModuleRegistry<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: AHashMap::new(),
        }
    }

    /// Scans the AST for every `from M import …`, loads each distinct
    /// module, and binds the imported names into the global frame.
    pub fn preload(&mut self, module: &Module, ctx: &mut Context) -> EvalResult<()> {
        let mut imports = Vec::new();
        collect_imports(&module.body, &mut imports);

        for stmt in imports {
            let StmtKind::FromImport { module: mod_name, names } = &stmt.kind else {
                continue;
            };
            if !self.cache.contains_key(&mod_name.name) {
                let exports = self.loader.load(&mod_name.name).map_err(|msg| {
                    Error::new(
                        ErrorKind::ModuleConnectionError,
                        format!("failed to load module '{}': {msg}", mod_name.name),
                        mod_name.range,
                    )
                })?;
                self.cache.insert(mod_name.name.clone(), exports.into_iter().collect());
            }
            let exports = &self.cache[&mod_name.name];
            for name in names {
                let Some(func) = exports.get(&name.name) else {
                    return Err(Error::new(
                        ErrorKind::ModuleInternalError,
                        format!("cannot import name '{}' from '{}'", name.name, mod_name.name),
                        name.range,
                    ));
                };
                let foreign_id = ctx.foreigns.alloc(ForeignFunction {
                    name: name.name.clone(),
                    func: Rc::clone(func),
                });
                let global = ctx.global_env;
                ctx.envs
                    .get_mut(global)
                    .bindings
                    .insert(name.name.clone(), Value::Foreign(foreign_id));
            }
        }
        Ok(())
    }
}

fn collect_imports<'a>(body: &'a [Rc<Stmt>], out: &mut Vec<&'a Rc<Stmt>>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::FromImport { .. } => out.push(stmt),
            StmtKind::If { body, orelse, .. } => {
                collect_imports(body, out);
                if let Some(orelse) = orelse {
                    collect_imports(orelse, out);
                }
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } | StmtKind::FunctionDef { body, .. } => {
                collect_imports(body, out);
            }
            _ => {}
        }
    }
}

/// Marshals an interpreter value into a host [`Object`].
///
/// Complex numbers and function values have no host representation and
/// raise at marshal time.
pub(crate) fn marshal_to_host(value: &Value, range: CodeRange) -> EvalResult<Object> {
    let object = match value {
        Value::Undefined => Object::None,
        Value::Bool(b) => Object::Bool(*b),
        Value::Int(i) => Object::from_bigint(i.clone()),
        Value::Float(f) => Object::Float(*f),
        Value::Str(s) => Object::String(s.to_string()),
        Value::Complex(_) | Value::Closure(_) | Value::Foreign(_) | Value::Builtin(_) => {
            return Err(Error::new(
                ErrorKind::ModuleInternalError,
                format!("value of type '{}' cannot be passed to a host function", value.type_name()),
                range,
            ));
        }
    };
    Ok(object)
}

/// Marshals a host return value back into an interpreter [`Value`].
pub(crate) fn marshal_from_host(object: Object, range: CodeRange) -> EvalResult<Value> {
    let value = match object {
        Object::None => Value::Undefined,
        Object::Bool(b) => Value::Bool(b),
        Object::Int(i) => Value::Int(i.into()),
        Object::BigInt(i) => Value::Int(i),
        Object::Float(f) => Value::Float(f),
        Object::String(s) => Value::Str(Rc::from(s.as_str())),
        Object::Complex { .. } | Object::Repr(_) => {
            return Err(Error::new(
                ErrorKind::ModuleInternalError,
                "host function returned a value the interpreter cannot accept",
                range,
            ));
        }
    };
    Ok(value)
}
