//! Modules: named groups of registrations.
//!
//! A module bundles the registrations of one part of an application.
//! Modules are collected at link time with [`module!`](crate::module) and
//! loaded by root namespace, so an application only wires the parts that
//! live under the namespace it configures.
//!
//! # Examples
//! ```rust,ignore
//! struct BillingModule;
//!
//! impl Module for BillingModule {
//!     fn register(&self, container: &mut Container) -> Result<()> {
//!         container.register(Implementation::<dyn Invoicer>::of::<PdfInvoicer>(), Lifecycle::Singleton, false)?;
//!         container.register_named::<dyn TaxTable>("EuTaxTable", Lifecycle::Singleton, false)?;
//!         Ok(())
//!     }
//! }
//!
//! bindery_container::module!(BillingModule);
//!
//! let mut container = Container::new();
//! container.load_modules("shop::billing")?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use crate::container::Container;
use crate::discovery::{in_namespace, is_module_path};
use crate::error::{DiscoveryError, Result};

/// A named unit of registrations.
pub trait Module: Send + Sync {
    /// Registers this module's bindings into `container`.
    fn register(&self, container: &mut Container) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A module collected at link time, with the module path it was
/// declared in.
pub struct ModuleEntry {
    module: &'static dyn Module,
    module_path: &'static str,
}

impl ModuleEntry {
    #[doc(hidden)]
    pub const fn new(module: &'static dyn Module, module_path: &'static str) -> Self {
        Self {
            module,
            module_path,
        }
    }

    pub fn module(&self) -> &'static dyn Module {
        self.module
    }

    pub fn module_path(&self) -> &'static str {
        self.module_path
    }
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("name", &self.module.name())
            .field("module_path", &self.module_path)
            .finish()
    }
}

inventory::collect!(ModuleEntry);

/// Collects a [`Module`] value for [`load_modules`].
///
/// The argument must be a constant expression, typically a unit struct.
#[macro_export]
macro_rules! module {
    ($module:expr) => {
        $crate::inventory::submit! {
            $crate::module::ModuleEntry::new(&$module, ::std::module_path!())
        }
    };
}

type ModuleList = Arc<[&'static ModuleEntry]>;

static LOADED: Lazy<RwLock<HashMap<String, ModuleList>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns every collected module declared at or below `root`, ordered
/// by module path.
///
/// The result is computed once per root and cached for the process.
///
/// # Errors
/// [`DiscoveryError`] if `root` is not a module path.
#[instrument]
pub fn load_modules(root: &str) -> Result<ModuleList> {
    if let Some(cached) = LOADED.read().get(root) {
        debug!(modules = cached.len(), "Module list cache hit");
        return Ok(Arc::clone(cached));
    }

    if !is_module_path(root) {
        return Err(DiscoveryError::new(root, "not a module path").into());
    }

    let mut found: Vec<&'static ModuleEntry> = inventory::iter::<ModuleEntry>
        .into_iter()
        .filter(|entry| in_namespace(entry.module_path(), root))
        .collect();
    found.sort_by(|a, b| {
        a.module_path()
            .cmp(b.module_path())
            .then_with(|| a.module().name().cmp(b.module().name()))
    });
    info!(modules = found.len(), "Collected modules");

    let list: ModuleList = found.into();
    let stored = LOADED
        .write()
        .entry(root.to_string())
        .or_insert(list)
        .clone();
    Ok(stored)
}
