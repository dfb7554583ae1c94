//! # The Container
//!
//! Maps contracts to bindings and hands out instances according to each
//! binding's [`Lifecycle`].
//!
//! # Architecture
//! ```text
//! register / register_named ──> Registry (contract -> [Binding])
//!                                    │
//!                                  get(cx)
//!                                    │
//!              ┌─────────────────────┼──────────────────────┐
//!              ▼                     ▼                      ▼
//!          Singleton             Transient               Scoped
//!   cache[(contract, index)]   construct anew   cache[(scope of cx, contract)]
//! ```
//!
//! Registration needs `&mut Container` and happens during startup.
//! Everything else takes `&Container` and may be called from any thread.
//!
//! # Examples
//! ```rust
//! use bindery_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! #[derive(Default)]
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String { "hello".into() }
//! }
//! bindery_container::implements!(English => dyn Greeter);
//!
//! let container = Container::builder()
//!     .register(Implementation::<dyn Greeter>::of::<English>(), Lifecycle::Singleton)
//!     .build()
//!     .expect("Failed to build container");
//!
//! let cx = Context::new();
//! let a: Arc<dyn Greeter> = container.get(&cx).unwrap();
//! let b: Arc<dyn Greeter> = container.get(&cx).unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert_eq!(a.greet(), "hello");
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn};

use crate::args::Args;
use crate::cache::InstanceCache;
use crate::discovery::{Catalog, Discovery, is_module_path};
use crate::error::{BinderyError, ConfigurationError, DiscoveryError, NoActiveScopeError, Result};
use crate::implementation::{Contract, ErasedInstance, Implementation, downcast_implementation};
use crate::inject::{Dependencies, Indices};
use crate::key::ContractKey;
use crate::lifecycle::Lifecycle;
use crate::module::{Module, load_modules};
use crate::registry::{Binding, Registration, Registry};
use crate::scope::{Context, ScopeId, ScopeRegistry};
use crate::settings::Settings;

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Inversion-of-control container.
///
/// `Container` is `Send + Sync`; share it behind an `Arc` once
/// registration is done.
pub struct Container {
    registry: Registry,
    cache: InstanceCache,
    scopes: ScopeRegistry,
    catalog: Catalog,
    root_namespace: String,
    excluded: Vec<String>,
}

impl Container {
    /// Creates an empty container configured from [`Settings::load`],
    /// discovering from the link-time catalog.
    pub fn new() -> Self {
        Self::with_settings(Settings::load())
    }

    /// Creates an empty container with explicit settings.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            registry: Registry::new(),
            cache: InstanceCache::new(),
            scopes: ScopeRegistry::new(),
            catalog: Catalog::linked().clone(),
            root_namespace: settings.root_namespace,
            excluded: Vec::new(),
        }
    }

    /// Creates a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    // ── Registration ──

    /// Binds `implementation` to contract `C`.
    ///
    /// Returns the index of the new binding.
    ///
    /// # Errors
    /// [`BinderyError::AlreadyRegistered`] if `C` already has a binding and
    /// `allow_override` is false.
    pub fn register<C: ?Sized + Contract>(
        &mut self,
        implementation: Implementation<C>,
        lifecycle: Lifecycle,
        allow_override: bool,
    ) -> Result<usize> {
        self.register_with(
            Registration::<C>::new()
                .implementation(implementation)
                .lifecycle(lifecycle)
                .allow_override(allow_override),
        )
    }

    /// Binds the catalogued implementation of `C` named `name`, searched
    /// under the root namespace.
    ///
    /// # Errors
    /// Configuration errors when no implementation or several distinct
    /// implementations carry that name, plus the errors of
    /// [`register`](Container::register).
    pub fn register_named<C: ?Sized + Contract>(
        &mut self,
        name: &str,
        lifecycle: Lifecycle,
        allow_override: bool,
    ) -> Result<usize> {
        self.register_with(
            Registration::<C>::new()
                .named(name)
                .lifecycle(lifecycle)
                .allow_override(allow_override),
        )
    }

    /// Processes a full registration request.
    ///
    /// Nothing is recorded when this returns an error.
    pub fn register_with<C: ?Sized + Contract>(&mut self, request: Registration<C>) -> Result<usize> {
        let contract = ContractKey::of::<C>();

        let implementation = match (request.implementation, request.name) {
            (Some(implementation), None) => implementation,
            (None, Some(name)) => self.discover::<C>(&name)?,
            (None, None) => {
                return Err(ConfigurationError::MissingImplementation { contract }.into());
            }
            (Some(_), Some(name)) => {
                return Err(ConfigurationError::ConflictingImplementation { contract, name }.into());
            }
        };

        let binding = Binding::new(implementation, request.lifecycle);
        self.registry.register(contract, binding, request.allow_override)
    }

    /// Looks up the catalogued implementation of `C` named `name`.
    ///
    /// The entry's erased implementation is checked against `C` again, since
    /// a hand-built entry can file an implementation under the wrong contract.
    fn discover<C: ?Sized + Contract>(&self, name: &str) -> Result<Implementation<C>> {
        let contract = ContractKey::of::<C>();
        let entry = self.discovery()?.find_named(contract, name)?;

        downcast_implementation::<C>(entry.implementation()).map_err(|_| {
            ConfigurationError::ContractMismatch {
                contract,
                implementation: entry.type_name(),
            }
            .into()
        })
    }

    /// Runs every module collected under `root` against this container.
    ///
    /// Returns the number of modules run.
    #[instrument(skip(self))]
    pub fn load_modules(&mut self, root: &str) -> Result<usize> {
        let modules = load_modules(root)?;
        for entry in modules.iter() {
            self.add_module(entry.module())?;
        }
        info!(modules = modules.len(), "Modules loaded");
        Ok(modules.len())
    }

    /// Runs one module's registrations.
    pub fn add_module(&mut self, module: &dyn Module) -> Result<()> {
        debug!(module = module.name(), "Registering module");
        module.register(self)
    }

    // ── Discovery configuration ──

    /// Sets the root namespace searched by name-based registration.
    ///
    /// # Errors
    /// [`DiscoveryError`] if `root` is not a module path.
    pub fn set_root_namespace(&mut self, root: impl Into<String>) -> Result<()> {
        let root = root.into();
        if !is_module_path(&root) {
            return Err(DiscoveryError::new(root, "not a module path").into());
        }
        debug!(root = %root, "Root namespace set");
        self.root_namespace = root;
        Ok(())
    }

    /// The root namespace searched by name-based registration.
    pub fn root_namespace(&self) -> &str {
        &self.root_namespace
    }

    /// Excludes `module` (and modules below it) from discovery.
    pub fn exclude_module(&mut self, module: impl Into<String>) {
        self.excluded.push(module.into());
    }

    /// Replaces the catalog searched by name-based registration.
    pub fn set_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    /// A discovery search configured like this container's.
    pub fn discovery(&self) -> Result<Discovery<'_>> {
        let discovery = Discovery::new(&self.catalog, self.root_namespace.clone())?;
        Ok(self
            .excluded
            .iter()
            .fold(discovery, |d, module| d.exclude_module(module.clone())))
    }

    // ── Resolution ──

    /// Returns the instance of binding 0 for `C`.
    pub fn get<C: ?Sized + Contract>(&self, cx: &Context) -> Result<Arc<C>> {
        self.get_with(cx, 0, &Args::new())
    }

    /// Returns the instance of binding `index` for `C`.
    pub fn get_at<C: ?Sized + Contract>(&self, cx: &Context, index: usize) -> Result<Arc<C>> {
        self.get_with(cx, index, &Args::new())
    }

    /// Returns the instance of binding `index` for `C`, passing `args` to
    /// the constructor if one runs.
    ///
    /// Cached lifecycles only use `args` for the first construction.
    ///
    /// # Errors
    /// - Configuration error for an unregistered contract or bad index
    /// - [`BinderyError::NoActiveScope`] for a scoped binding when `cx`
    ///   has no active scope
    /// - [`BinderyError::ConstructionFailed`] when the constructor fails
    pub fn get_with<C: ?Sized + Contract>(
        &self,
        cx: &Context,
        index: usize,
        args: &Args,
    ) -> Result<Arc<C>> {
        let contract = ContractKey::of::<C>();
        trace!(contract = %contract, index, context = %cx, "Resolving");

        let binding = self.registry.binding(&contract, index)?;
        let instance = match binding.lifecycle {
            Lifecycle::Singleton => {
                self.cache
                    .singleton(contract, index, || binding.construct(contract, args))?
            }
            Lifecycle::Transient => binding.construct(contract, args)?,
            Lifecycle::Scoped => {
                let scope = self.scopes.current(cx).ok_or_else(|| {
                    BinderyError::NoActiveScope(NoActiveScopeError {
                        contract,
                        lifecycle: binding.lifecycle,
                    })
                })?;
                self.cache
                    .scoped(scope, contract, || binding.construct(contract, args))?
            }
        };

        unerase::<C>(contract, binding.implementation, instance)
    }

    /// Calls `f` with its parameters resolved from the container.
    ///
    /// ```rust,ignore
    /// let name = container.invoke(&cx, &Indices::new(), |greeter: Arc<dyn Greeter>| greeter.greet())?;
    /// ```
    pub fn invoke<D, R>(&self, cx: &Context, indices: &Indices, f: impl FnOnce(D) -> R) -> Result<R>
    where
        D: Dependencies,
    {
        let dependencies = D::resolve(self, cx, indices)?;
        Ok(f(dependencies))
    }

    // ── Scopes ──

    /// Starts a fresh scope for `cx` and makes it current.
    ///
    /// A scope already active for `cx` is replaced, not ended; its cached
    /// instances stay in memory until the container is dropped.
    pub fn start_scope(&self, cx: &Context) -> ScopeId {
        let (scope, replaced) = self.open_scope(cx);

        if let Some(previous) = replaced {
            warn!(
                context = %cx,
                previous = %previous,
                scope = %scope,
                "Scope started while another was active; previous scope orphaned"
            );
        } else {
            debug!(context = %cx, scope = %scope, "Scope started");
        }
        scope
    }

    /// Opens the bucket of a new scope, then publishes it as current.
    fn open_scope(&self, cx: &Context) -> (ScopeId, Option<ScopeId>) {
        let scope = ScopeId::next();
        self.cache.open_scope(scope);
        let replaced = self.scopes.start(cx, scope);
        (scope, replaced)
    }

    /// Ends the current scope of `cx`, dropping its cached instances.
    ///
    /// No-op when `cx` has no active scope.
    pub fn end_scope(&self, cx: &Context) -> Option<ScopeId> {
        let scope = self.scopes.end(cx)?;
        let dropped = self.cache.close_scope(scope).unwrap_or(0);
        debug!(context = %cx, scope = %scope, dropped, "Scope ended");
        Some(scope)
    }

    /// Ends `scope` specifically. If it is still current for `cx`, the
    /// scope it replaced becomes current again while that one is open.
    fn leave_scope(&self, cx: &Context, scope: ScopeId, previous: Option<ScopeId>) {
        let previous = previous.filter(|previous| self.cache.is_open(*previous));
        let restored = self.scopes.finish(cx, scope, previous) && previous.is_some();
        let dropped = self.cache.close_scope(scope).unwrap_or(0);
        debug!(context = %cx, scope = %scope, dropped, restored, "Scope ended");
    }

    /// The active scope of `cx`, if any.
    pub fn current_scope(&self, cx: &Context) -> Option<ScopeId> {
        self.scopes.current(cx)
    }

    /// Starts a scope for `cx` that ends when the guard is dropped.
    ///
    /// Guards nest: dropping the inner guard ends only its own scope and
    /// makes the outer one current again.
    pub fn enter_scope(&self, cx: &Context) -> ScopeGuard<'_> {
        let (scope, previous) = self.open_scope(cx);
        match previous {
            Some(previous) => {
                debug!(context = %cx, previous = %previous, scope = %scope, "Nested scope started")
            }
            None => debug!(context = %cx, scope = %scope, "Scope started"),
        }
        ScopeGuard {
            container: self,
            cx: *cx,
            scope,
            previous,
        }
    }

    /// Runs `f` inside a fresh scope for `cx`.
    ///
    /// The scope ends when `f` returns or panics.
    pub fn with_scope<R>(&self, cx: &Context, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.enter_scope(cx);
        f(self)
    }

    /// Runs every function in order inside one scope for `cx`.
    pub fn run_scoped<R, F>(&self, cx: &Context, fns: impl IntoIterator<Item = F>) -> Vec<R>
    where
        F: FnOnce(&Self) -> R,
    {
        self.with_scope(cx, |container| fns.into_iter().map(|f| f(container)).collect())
    }

    // ── Introspection ──

    /// Returns `true` if `C` has at least one binding.
    pub fn contains<C: ?Sized + Contract>(&self) -> bool {
        self.registry.contains(&ContractKey::of::<C>())
    }

    /// Number of bindings registered for `C`.
    pub fn binding_count<C: ?Sized + Contract>(&self) -> usize {
        self.registry.binding_count(&ContractKey::of::<C>())
    }

    /// Number of contracts with bindings.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Renders every contract with its bindings, one table per contract.
    pub fn describe(&self) -> String {
        self.registry.describe()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("contracts", &self.registry.len())
            .field("root_namespace", &self.root_namespace)
            .field("singletons", &self.cache.singleton_count())
            .field("active_scopes", &self.scopes.active())
            .field("open_buckets", &self.cache.scope_count())
            .finish()
    }
}

/// Recovers `Arc<C>` from a cached or freshly built instance.
fn unerase<C: ?Sized + Contract>(
    contract: ContractKey,
    implementation: &'static str,
    instance: ErasedInstance,
) -> Result<Arc<C>> {
    instance.downcast_ref::<Arc<C>>().cloned().ok_or_else(|| {
        BinderyError::construction(
            contract,
            implementation,
            format!("instance is not an Arc<{}>", contract.type_name()),
        )
    })
}

// ═══════════════════════════════════════════
// ScopeGuard
// ═══════════════════════════════════════════

/// Ends the scope it started when dropped.
///
/// Returned by [`Container::enter_scope`]. If that scope is still current
/// for the context, the scope it replaced becomes current again.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard<'a> {
    container: &'a Container,
    cx: Context,
    scope: ScopeId,
    previous: Option<ScopeId>,
}

impl ScopeGuard<'_> {
    /// The scope this guard started.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// The context the scope belongs to.
    pub fn context(&self) -> Context {
        self.cx
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.container.leave_scope(&self.cx, self.scope, self.previous);
    }
}

impl fmt::Debug for ScopeGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("context", &self.cx)
            .field("scope", &self.scope)
            .field("previous", &self.previous)
            .finish()
    }
}

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Builds a [`Container`] in one expression.
///
/// Registrations run immediately; the first error is kept and returned
/// by [`build()`](ContainerBuilder::build). Set the catalog and root
/// namespace before any name-based registration.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .settings(Settings::load())
///     .register(Implementation::<dyn Clock>::of::<SystemClock>(), Lifecycle::Singleton)
///     .register_named::<dyn Mailer>("SmtpMailer", Lifecycle::Transient)
///     .build()?;
/// ```
pub struct ContainerBuilder {
    container: Container,
    allow_override: bool,
    error: Option<BinderyError>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            container: Container::with_settings(Settings::default()),
            allow_override: false,
            error: None,
        }
    }

    /// Allow appending bindings to contracts that already have one.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    /// Searches `catalog` instead of the link-time catalog.
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.container.set_catalog(catalog);
        self
    }

    /// Applies `settings`.
    pub fn settings(self, settings: Settings) -> Self {
        self.root_namespace(settings.root_namespace)
    }

    /// Sets the root namespace for name-based registration.
    pub fn root_namespace(mut self, root: impl Into<String>) -> Self {
        let result = self.container.set_root_namespace(root);
        self.record(result)
    }

    /// Excludes `module` from discovery.
    pub fn exclude_module(mut self, module: impl Into<String>) -> Self {
        self.container.exclude_module(module);
        self
    }

    // ── Registration ──

    pub fn register<C: ?Sized + Contract>(mut self, implementation: Implementation<C>, lifecycle: Lifecycle) -> Self {
        let result = self
            .container
            .register(implementation, lifecycle, self.allow_override);
        self.record(result)
    }

    pub fn register_named<C: ?Sized + Contract>(mut self, name: &str, lifecycle: Lifecycle) -> Self {
        let result = self
            .container
            .register_named::<C>(name, lifecycle, self.allow_override);
        self.record(result)
    }

    /// Processes a full request; its own override flag applies.
    pub fn register_with<C: ?Sized + Contract>(mut self, request: Registration<C>) -> Self {
        let result = self.container.register_with(request);
        self.record(result)
    }

    // ── Modules ──

    /// Runs one module's registrations.
    pub fn module(mut self, module: &dyn Module) -> Self {
        let result = self.container.add_module(module);
        self.record(result)
    }

    /// Runs every module collected under `root`.
    pub fn modules(mut self, root: &str) -> Self {
        let result = self.container.load_modules(root);
        self.record(result)
    }

    // ── Build ──

    /// Returns the container, or the first error hit while building it.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        if let Some(error) = self.error {
            return Err(error);
        }
        info!(contracts = self.container.len(), "Container built");
        Ok(self.container)
    }

    fn record<T>(mut self, result: Result<T>) -> Self {
        if let Err(error) = result {
            if self.error.is_none() {
                self.error = Some(error);
            } else {
                debug!(error = %error, "Further builder error ignored");
            }
        }
        self
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("container", &self.container)
            .field("allow_override", &self.allow_override)
            .field("error", &self.error)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, ScopeGuard};
    pub use crate::args::Args;
    pub use crate::error::{BinderyError, ErrorKind, Result};
    pub use crate::implementation::{Implementation, Implements};
    pub use crate::inject::Indices;
    pub use crate::key::ContractKey;
    pub use crate::lifecycle::Lifecycle;
    pub use crate::module::Module;
    pub use crate::registry::Registration;
    pub use crate::scope::{Context, ScopeId};
    pub use crate::settings::Settings;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
