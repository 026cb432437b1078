//! Method registry
//!
//! Process-local mapping from method name to factory. The registry is an
//! ordinary value owned by `main` and passed to the orchestrator, so tests can
//! build as many isolated registries as they like.
//!
//! Registrations overwrite by default (last one wins). Passing `force = false`
//! turns a collision into [`RegistryError::DuplicateRegistration`], naming the
//! origin of the registration that already holds the name.

use super::plugin::{self, LoadedPlugin};
use super::{factory_for, Method, MethodArgs, MethodFactory};
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("method '{name}' is already registered by {owner}")]
    DuplicateRegistration { name: String, owner: MethodOrigin },

    #[error("method '{name}' not found in registered methods")]
    NotFound { name: String },

    #[error("invalid method name '{name}'")]
    InvalidName { name: String },

    #[error("plugin file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to load plugin {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Where a registration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOrigin {
    /// Shipped with rankbench
    Builtin,
    /// Registered by a plugin library's entry point
    Plugin(PathBuf),
    /// Registered directly by the embedding program
    Runtime,
}

impl fmt::Display for MethodOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodOrigin::Builtin => write!(f, "built-in methods"),
            MethodOrigin::Plugin(path) => write!(f, "plugin {}", path.display()),
            MethodOrigin::Runtime => write!(f, "runtime registration"),
        }
    }
}

/// One name → factory binding
#[derive(Clone)]
pub struct MethodRegistration {
    pub name: String,
    pub factory: MethodFactory,
    pub origin: MethodOrigin,
}

impl fmt::Debug for MethodRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistration")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// One or more names to bind a factory under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNames(Vec<String>);

impl MethodNames {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for MethodNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for MethodNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for MethodNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<&[&str]> for MethodNames {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for MethodNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Name → factory registry
///
/// Field order matters: registrations are dropped before the plugin libraries
/// whose code their factories point into.
pub struct MethodRegistry {
    methods: HashMap<String, MethodRegistration>,
    scope: MethodOrigin,
    plugins: Vec<LoadedPlugin>,
}

impl MethodRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            scope: MethodOrigin::Runtime,
            plugins: Vec::new(),
        }
    }

    /// Create a registry holding the built-in methods
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.scope = MethodOrigin::Builtin;
        super::builtin::register_builtins(&mut registry);
        registry.scope = MethodOrigin::Runtime;
        registry
    }

    /// Bind `factory` under every name in `names`
    ///
    /// With `force == false`, fails without touching the registry if any of
    /// the names is already bound. Returns `factory` unchanged so callers can
    /// keep using the handle they registered.
    pub fn register(
        &mut self,
        names: impl Into<MethodNames>,
        factory: MethodFactory,
        force: bool,
    ) -> Result<MethodFactory, RegistryError> {
        let names = names.into();

        if names.0.is_empty() {
            return Err(RegistryError::InvalidName {
                name: String::new(),
            });
        }
        for name in names.iter() {
            if name.trim().is_empty() {
                return Err(RegistryError::InvalidName {
                    name: name.to_string(),
                });
            }
            if !force {
                if let Some(existing) = self.methods.get(name) {
                    return Err(RegistryError::DuplicateRegistration {
                        name: name.to_string(),
                        owner: existing.origin.clone(),
                    });
                }
            }
        }

        for name in names.0 {
            debug!("registering method '{}' ({})", name, self.scope);
            self.methods.insert(
                name.clone(),
                MethodRegistration {
                    name,
                    factory: factory.clone(),
                    origin: self.scope.clone(),
                },
            );
        }

        Ok(factory)
    }

    /// Register a closure under one name, overwriting any previous binding
    pub fn register_fn<F, U>(&mut self, name: &str, build: F) -> MethodFactory
    where
        F: Fn(&MethodArgs) -> anyhow::Result<U> + Send + Sync + 'static,
        U: super::ExecutableUnit + 'static,
    {
        let factory = super::factory(build);
        self.methods.insert(
            name.to_string(),
            MethodRegistration {
                name: name.to_string(),
                factory: factory.clone(),
                origin: self.scope.clone(),
            },
        );
        factory
    }

    /// Register a [`Method`] type under `names`, overwriting previous bindings
    pub fn register_method<M: Method>(
        &mut self,
        names: impl Into<MethodNames>,
    ) -> Result<MethodFactory, RegistryError> {
        self.register(names, factory_for::<M>(), true)
    }

    /// Look up the factory bound to `name`
    pub fn resolve(&self, name: &str) -> Result<MethodFactory, RegistryError> {
        self.methods
            .get(name)
            .map(|registration| registration.factory.clone())
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    /// Full registration record for `name`
    pub fn registration(&self, name: &str) -> Option<&MethodRegistration> {
        self.methods.get(name)
    }

    /// Currently registered names, sorted
    pub fn list_names(&self) -> BTreeSet<String> {
        self.methods.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Paths of the plugin libraries loaded so far
    pub fn plugin_paths(&self) -> impl Iterator<Item = &Path> {
        self.plugins.iter().map(LoadedPlugin::path)
    }

    /// Load a native plugin library and run its registration entry point
    ///
    /// The library stays loaded for the lifetime of the registry. Plugins run
    /// with full process privileges; only load libraries you trust.
    pub fn load_external(&mut self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RegistryError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let load_error = |source: anyhow::Error| RegistryError::Load {
            path: path.to_path_buf(),
            source: source.into(),
        };

        let library = plugin::open_library(path).map_err(load_error)?;
        let entry = plugin::entry_point(&library).map_err(load_error)?;

        let before = self.methods.len();
        let previous = std::mem::replace(&mut self.scope, MethodOrigin::Plugin(path.to_path_buf()));
        // Panics are caught inside the plugin by `declare_plugin!`
        let outcome = entry(self);
        self.scope = previous;

        // Keep the library even on failure: partial registrations point into it
        self.plugins.push(LoadedPlugin::new(path.to_path_buf(), library));

        match outcome {
            Ok(()) => {
                info!(
                    "loaded plugin {} ({} methods registered)",
                    path.display(),
                    self.methods.len().saturating_sub(before)
                );
                Ok(())
            }
            Err(e) => Err(load_error(e.context("plugin registration failed"))),
        }
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.list_names())
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::{factory, ExecutableUnit};
    use std::sync::Arc;

    struct Noop;

    impl ExecutableUnit for Noop {
        fn run(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn noop_factory() -> MethodFactory {
        factory(|_args: &MethodArgs| Ok(Noop))
    }

    #[test]
    fn test_register_resolve_returns_same_factory() {
        let mut registry = MethodRegistry::new();
        let registered = registry.register("Noop", noop_factory(), true).unwrap();
        let resolved = registry.resolve("Noop").unwrap();
        assert!(Arc::ptr_eq(&registered, &resolved));
    }

    #[test]
    fn test_register_returns_factory_unchanged() {
        let mut registry = MethodRegistry::new();
        let original = noop_factory();
        let returned = registry.register("Noop", original.clone(), true).unwrap();
        assert!(Arc::ptr_eq(&original, &returned));
    }

    #[test]
    fn test_register_multiple_names() {
        let mut registry = MethodRegistry::new();
        let f = registry.register(["A", "B"], noop_factory(), true).unwrap();
        assert!(Arc::ptr_eq(&registry.resolve("A").unwrap(), &f));
        assert!(Arc::ptr_eq(&registry.resolve("B").unwrap(), &f));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_without_force_fails() {
        let mut registry = MethodRegistry::new();
        let first = registry.register("Noop", noop_factory(), true).unwrap();

        let err = registry.register("Noop", noop_factory(), false).err().unwrap();
        match err {
            RegistryError::DuplicateRegistration { name, owner } => {
                assert_eq!(name, "Noop");
                assert_eq!(owner, MethodOrigin::Runtime);
            }
            other => panic!("unexpected error: {other}"),
        }

        // First registration is untouched
        assert!(Arc::ptr_eq(&registry.resolve("Noop").unwrap(), &first));
    }

    #[test]
    fn test_duplicate_without_force_is_all_or_nothing() {
        let mut registry = MethodRegistry::new();
        registry.register("B", noop_factory(), true).unwrap();

        assert!(registry.register(["A", "B"], noop_factory(), false).is_err());
        assert!(registry.resolve("A").is_err());
    }

    #[test]
    fn test_duplicate_with_force_last_wins() {
        let mut registry = MethodRegistry::new();
        registry.register("Noop", noop_factory(), true).unwrap();
        let second = registry.register("Noop", noop_factory(), true).unwrap();
        assert!(Arc::ptr_eq(&registry.resolve("Noop").unwrap(), &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_missing_is_not_found() {
        let registry = MethodRegistry::with_builtins();
        match registry.resolve("DoesNotExist") {
            Err(RegistryError::NotFound { name }) => assert_eq!(name, "DoesNotExist"),
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut registry = MethodRegistry::new();
        assert!(matches!(
            registry.register("", noop_factory(), true),
            Err(RegistryError::InvalidName { .. })
        ));
        assert!(matches!(
            registry.register(Vec::<String>::new(), noop_factory(), true),
            Err(RegistryError::InvalidName { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_builtins_are_tagged() {
        let registry = MethodRegistry::with_builtins();
        let names = registry.list_names();
        for name in ["Echo", "Command", "OpenAIChat", "OpenAIChatStream"] {
            assert!(names.contains(name), "missing built-in {name}");
        }
        assert_eq!(
            registry.registration("Echo").unwrap().origin,
            MethodOrigin::Builtin
        );
    }

    #[test]
    fn test_duplicate_of_builtin_names_owner() {
        let mut registry = MethodRegistry::with_builtins();
        let err = registry.register("Echo", noop_factory(), false).err().unwrap();
        assert_eq!(
            err.to_string(),
            "method 'Echo' is already registered by built-in methods"
        );
    }

    #[test]
    fn test_list_names_does_not_mutate() {
        let registry = MethodRegistry::with_builtins();
        let before = registry.list_names();
        let _ = registry.list_names();
        assert_eq!(registry.list_names(), before);
        assert_eq!(registry.len(), before.len());
    }

    #[test]
    fn test_load_external_missing_file() {
        let mut registry = MethodRegistry::new();
        let err = registry
            .load_external("/nonexistent/librankbench_missing.so")
            .unwrap_err();
        assert!(matches!(err, RegistryError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_external_not_a_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_plugin.so");
        std::fs::write(&path, b"this is not a shared object").unwrap();

        let mut registry = MethodRegistry::new();
        let err = registry.load_external(&path).unwrap_err();
        match err {
            RegistryError::Load { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("expected Load, got {other}"),
        }
        assert!(registry.is_empty());
        assert_eq!(registry.plugin_paths().count(), 0);
    }
}
