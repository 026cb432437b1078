//! Pluggable benchmark methods
//!
//! A *method* is a named, user-supplied unit of work that every rank times.
//! Methods are looked up by name in a [`MethodRegistry`], constructed from a
//! flat string argument map, run exactly once and dropped.
//!
//! # Writing a method
//!
//! ```
//! use rankbench::methods::{ExecutableUnit, Method, MethodArgs, MethodRegistry};
//!
//! struct Noop;
//!
//! impl ExecutableUnit for Noop {
//!     fn run(&mut self) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! impl Method for Noop {
//!     fn from_args(_args: &MethodArgs) -> anyhow::Result<Self> {
//!         Ok(Noop)
//!     }
//! }
//!
//! let mut registry = MethodRegistry::new();
//! registry.register_method::<Noop>("Noop").unwrap();
//! assert!(registry.list_names().contains("Noop"));
//! ```

pub mod args;
pub mod builtin;
pub mod plugin;
pub mod registry;

use std::sync::Arc;

pub use args::{parse_method_args, ArgumentParseError, MethodArgs};
pub use registry::{MethodNames, MethodOrigin, MethodRegistration, MethodRegistry, RegistryError};

/// The contract every timed unit satisfies
///
/// `run` is treated as one opaque synchronous call: whatever it does internally
/// (blocking network IO, streaming, spawning processes) is what gets timed.
/// Units are moved onto a blocking thread for the call, hence `Send`.
pub trait ExecutableUnit: Send {
    /// Execute the unit once
    fn run(&mut self) -> anyhow::Result<()>;
}

impl ExecutableUnit for Box<dyn ExecutableUnit> {
    fn run(&mut self) -> anyhow::Result<()> {
        (**self).run()
    }
}

/// A unit that can be built from method arguments
///
/// Implementing this gives a type a ready-made factory through
/// [`factory_for`] and [`MethodRegistry::register_method`].
pub trait Method: ExecutableUnit + Sized + 'static {
    /// Construct the unit, coercing string arguments as needed
    fn from_args(args: &MethodArgs) -> anyhow::Result<Self>;
}

/// Shared constructor for a method's executable unit
pub type MethodFactory =
    Arc<dyn Fn(&MethodArgs) -> anyhow::Result<Box<dyn ExecutableUnit>> + Send + Sync>;

/// Wrap a closure as a [`MethodFactory`]
pub fn factory<F, U>(build: F) -> MethodFactory
where
    F: Fn(&MethodArgs) -> anyhow::Result<U> + Send + Sync + 'static,
    U: ExecutableUnit + 'static,
{
    Arc::new(move |args: &MethodArgs| {
        let unit = build(args)?;
        Ok(Box::new(unit) as Box<dyn ExecutableUnit>)
    })
}

/// Factory for a [`Method`] type
pub fn factory_for<M: Method>() -> MethodFactory {
    factory(M::from_args)
}
