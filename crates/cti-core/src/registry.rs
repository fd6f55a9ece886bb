//! Process-wide type registry.
//!
//! Maps type codes to names and, for extension kinds, to the hooks the
//! codec needs to marshal them. Built-ins are present from construction.
//! Extensions are appended once, normally at start-up, and never removed.
//! Registration is expected to happen before any concurrent encode or
//! decode; the internal lock only keeps late registration memory-safe.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cti_sys::{RawHandle, TypeCode};
use tracing::{info, warn};

use crate::error::{CtiError, CtiResult};

/// Whether a wrapper is responsible for releasing a foreign handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    /// The wrapper releases the handle.
    Owned,
    /// Someone else releases the handle.
    #[default]
    Borrowed,
}

/// Capability check used during encode: yields the bare handle if the value
/// is an instance of the extension kind.
pub type ProbeFn = fn(&dyn Any) -> Option<RawHandle>;

/// Codec hooks for one extension kind.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionHooks {
    /// Encode-side capability check.
    pub probe: ProbeFn,
    /// Ownership given to handles of this kind when they are decoded.
    pub decode_ownership: Ownership,
}

impl ExtensionHooks {
    /// Hooks with borrowed-on-decode semantics.
    #[must_use]
    pub const fn new(probe: ProbeFn) -> Self {
        Self {
            probe,
            decode_ownership: Ownership::Borrowed,
        }
    }

    /// Override the ownership given to decoded handles.
    #[must_use]
    pub const fn with_decode_ownership(mut self, ownership: Ownership) -> Self {
        self.decode_ownership = ownership;
        self
    }
}

/// One row of the registry.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    /// The type code.
    pub code: TypeCode,
    /// Human-readable name.
    pub name: String,
    /// Extension hooks; `None` for built-ins.
    pub hooks: Option<ExtensionHooks>,
}

impl TypeEntry {
    /// Whether this entry describes a built-in kind.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.hooks.is_none()
    }
}

#[derive(Debug, Default)]
struct Tables {
    by_code: BTreeMap<TypeCode, TypeEntry>,
    by_name: HashMap<String, TypeCode>,
}

/// Append-only table of type codes, names and codec hooks.
#[derive(Debug)]
pub struct TypeRegistry {
    tables: RwLock<Tables>,
}

static GLOBAL: LazyLock<Arc<TypeRegistry>> = LazyLock::new(|| Arc::new(TypeRegistry::new()));

impl TypeRegistry {
    /// A registry holding only the built-in kinds.
    #[must_use]
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for (code, name) in TypeCode::BUILTINS {
            tables.by_code.insert(
                code,
                TypeEntry {
                    code,
                    name: name.to_owned(),
                    hooks: None,
                },
            );
            tables.by_name.insert(name.to_owned(), code);
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an extension kind.
    ///
    /// # Errors
    ///
    /// Returns [`CtiError::DuplicateTypeCode`] if `code` is a built-in or
    /// already registered, and [`CtiError::DuplicateTypeName`] if `name` is.
    pub fn register(
        &self,
        code: TypeCode,
        name: impl Into<String>,
        hooks: ExtensionHooks,
    ) -> CtiResult<()> {
        let name = name.into();
        let mut tables = self.write();

        if code.is_builtin() || tables.by_code.contains_key(&code) {
            warn!(type_code = code.0, name = %name, "rejected duplicate type code");
            return Err(CtiError::DuplicateTypeCode(code));
        }
        if tables.by_name.contains_key(&name) {
            warn!(type_code = code.0, name = %name, "rejected duplicate type name");
            return Err(CtiError::DuplicateTypeName(name));
        }

        tables.by_name.insert(name.clone(), code);
        tables.by_code.insert(
            code,
            TypeEntry {
                code,
                name: name.clone(),
                hooks: Some(hooks),
            },
        );
        info!(type_code = code.0, name = %name, "registered extension type");
        Ok(())
    }

    /// Hooks of an extension kind. `None` for built-ins and unknown codes.
    #[must_use]
    pub fn lookup_by_code(&self, code: TypeCode) -> Option<ExtensionHooks> {
        self.read().by_code.get(&code).and_then(|e| e.hooks)
    }

    /// Code registered under `name`, built-in or extension.
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<TypeCode> {
        self.read().by_name.get(name).copied()
    }

    /// Full entry for `code`.
    #[must_use]
    pub fn entry(&self, code: TypeCode) -> Option<TypeEntry> {
        self.read().by_code.get(&code).cloned()
    }

    /// Name registered for `code`.
    #[must_use]
    pub fn name_of(&self, code: TypeCode) -> Option<String> {
        self.read().by_code.get(&code).map(|e| e.name.clone())
    }

    /// Registered extension codes with their probes, ascending by code.
    #[must_use]
    pub fn extension_probes(&self) -> Vec<(TypeCode, ProbeFn)> {
        self.read()
            .by_code
            .values()
            .filter_map(|e| e.hooks.map(|h| (e.code, h.probe)))
            .collect()
    }

    /// Registered extension codes, ascending.
    #[must_use]
    pub fn extension_codes(&self) -> Vec<TypeCode> {
        self.extension_probes().into_iter().map(|(c, _)| c).collect()
    }

    /// Number of entries, built-ins included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_code.len()
    }

    /// Always false: built-ins are present from construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().by_code.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
