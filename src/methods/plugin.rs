//! Native plugin libraries
//!
//! A plugin is a `cdylib` crate that depends on `rankbench` and exports a
//! registration entry point:
//!
//! ```ignore
//! use rankbench::methods::MethodRegistry;
//!
//! fn register(registry: &mut MethodRegistry) -> anyhow::Result<()> {
//!     registry.register_method::<MyMethod>("MyMethod")?;
//!     Ok(())
//! }
//!
//! rankbench::declare_plugin!(register);
//! ```
//!
//! The entry point uses the Rust ABI, so the plugin must be built with the same
//! compiler and the same rankbench version as the host binary.

use super::MethodRegistry;
use anyhow::{Context, Result};
use libloading::Library;
use std::any::Any;
use std::path::{Path, PathBuf};

/// Name of the symbol every plugin exports
pub const PLUGIN_ENTRY_SYMBOL: &str = "rankbench_register_methods";

/// Signature of the exported entry point
pub type PluginEntry = fn(&mut MethodRegistry) -> anyhow::Result<()>;

/// Export `$register` as the plugin entry point
///
/// `$register` must have the [`PluginEntry`] signature. A panic inside it is
/// caught on the plugin side and returned as an error: the plugin links its own
/// `std`, and the host cannot unwind through a foreign panic.
#[macro_export]
macro_rules! declare_plugin {
    ($register:path) => {
        #[no_mangle]
        pub fn rankbench_register_methods(
            registry: &mut $crate::methods::MethodRegistry,
        ) -> $crate::Result<()> {
            let entry: $crate::methods::plugin::PluginEntry = $register;
            match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| entry(registry))) {
                Ok(result) => result,
                Err(payload) => Err($crate::methods::plugin::panic_error(payload)),
            }
        }
    };
}

/// Convert a caught registration panic into an error
#[doc(hidden)]
pub fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    anyhow::anyhow!("plugin registration panicked: {}", panic_message(&*payload))
}

/// A library kept alive by the registry
pub(crate) struct LoadedPlugin {
    path: PathBuf,
    _library: Library,
}

impl LoadedPlugin {
    pub(crate) fn new(path: PathBuf, library: Library) -> Self {
        Self {
            path,
            _library: library,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

/// Open `path` as a dynamic library
pub(crate) fn open_library(path: &Path) -> Result<Library> {
    // SAFETY: loading runs the library's initialisers. Plugins are
    // operator-supplied and trusted by definition.
    unsafe { Library::new(path) }
        .with_context(|| format!("failed to open dynamic library {}", path.display()))
}

/// Look up the registration entry point in an opened library
///
/// The returned function pointer is only valid while `library` is loaded.
pub(crate) fn entry_point(library: &Library) -> Result<PluginEntry> {
    // SAFETY: the symbol is declared by `declare_plugin!` with the
    // `PluginEntry` signature.
    let symbol = unsafe { library.get::<PluginEntry>(PLUGIN_ENTRY_SYMBOL.as_bytes()) }
        .with_context(|| format!("plugin does not export '{}'", PLUGIN_ENTRY_SYMBOL))?;
    Ok(*symbol)
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
