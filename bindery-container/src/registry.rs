//! Binding registry mapping each contract to its ordered bindings.
//!
//! Bindings are appended in registration order and never mutated or
//! removed. An index into a contract's list selects one binding; index 0
//! is the first one registered.

use std::collections::HashMap;
use std::fmt;

use bindery_support::rendering::{BindingRow, render_binding_table, suggest_similar};
use tracing::{debug, trace};

use crate::args::Args;
use crate::error::{
    AlreadyRegisteredError, BinderyError, ConfigurationError, NotRegisteredError, Result,
};
use crate::implementation::{Contract, ErasedConstructFn, ErasedInstance, Implementation};
use crate::key::ContractKey;
use crate::lifecycle::Lifecycle;

/// One (implementation, lifecycle) pair registered for a contract.
#[derive(Clone)]
pub(crate) struct Binding {
    pub implementation: &'static str,
    pub lifecycle: Lifecycle,
    construct: ErasedConstructFn,
}

impl Binding {
    pub fn new<C: ?Sized + Contract>(implementation: Implementation<C>, lifecycle: Lifecycle) -> Self {
        Self {
            implementation: implementation.type_name(),
            lifecycle,
            construct: implementation.into_erased_constructor(),
        }
    }

    /// Runs the implementation's constructor.
    pub fn construct(&self, contract: ContractKey, args: &Args) -> Result<ErasedInstance> {
        trace!(contract = %contract, implementation = self.implementation, "Constructing instance");
        (self.construct)(args)
            .map_err(|source| BinderyError::construction(contract, self.implementation, source))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("implementation", &self.implementation)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

/// A registration request for contract `C`.
///
/// Exactly one of [`implementation`](Registration::implementation) or
/// [`named`](Registration::named) must be set; the container rejects the
/// request otherwise.
///
/// # Examples
/// ```
/// use bindery_container::lifecycle::Lifecycle;
/// use bindery_container::registry::Registration;
///
/// trait Clock: Send + Sync {}
///
/// let request = Registration::<dyn Clock>::new()
///     .named("SystemClock")
///     .lifecycle(Lifecycle::Transient)
///     .allow_override(true);
/// assert_eq!(request.name(), Some("SystemClock"));
/// ```
pub struct Registration<C: ?Sized> {
    pub(crate) implementation: Option<Implementation<C>>,
    pub(crate) name: Option<String>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) allow_override: bool,
}

impl<C: ?Sized + Contract> Registration<C> {
    /// Creates an empty singleton request without override permission.
    pub fn new() -> Self {
        Self {
            implementation: None,
            name: None,
            lifecycle: Lifecycle::Singleton,
            allow_override: false,
        }
    }

    /// Binds a concrete implementation.
    pub fn implementation(mut self, implementation: Implementation<C>) -> Self {
        self.implementation = Some(implementation);
        self
    }

    /// Binds the catalogued implementation with this bare type name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the lifecycle (default: singleton).
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Allows appending to a contract that already has bindings.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    /// The requested implementation name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl<C: ?Sized + Contract> Default for Registration<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stores every binding, keyed by contract.
///
/// Populated during startup through `&mut` access; read-only afterwards.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    bindings: HashMap<ContractKey, Vec<Binding>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a binding for `contract` and returns its index.
    ///
    /// # Errors
    /// Returns [`BinderyError::AlreadyRegistered`] if the contract already
    /// has bindings and `allow_override` is false. Nothing is recorded in
    /// that case.
    pub fn register(
        &mut self,
        contract: ContractKey,
        binding: Binding,
        allow_override: bool,
    ) -> Result<usize> {
        let existing = self.bindings.get(&contract).map_or(0, Vec::len);

        if existing > 0 && !allow_override {
            return Err(BinderyError::AlreadyRegistered(AlreadyRegisteredError {
                contract,
                existing,
            }));
        }

        debug!(
            contract = %contract,
            implementation = binding.implementation,
            lifecycle = %binding.lifecycle,
            index = existing,
            "Registered binding"
        );
        self.bindings.entry(contract).or_default().push(binding);
        Ok(existing)
    }

    /// Looks up the binding at `index` for `contract`.
    ///
    /// # Errors
    /// Configuration errors for an unknown contract or an index past the
    /// end of its list.
    pub fn binding(&self, contract: &ContractKey, index: usize) -> Result<&Binding> {
        let bindings = self.bindings.get(contract).ok_or_else(|| {
            ConfigurationError::NotRegistered(NotRegisteredError {
                requested: *contract,
                suggestions: self.suggestions_for(contract),
            })
        })?;

        bindings.get(index).ok_or_else(|| {
            ConfigurationError::IndexOutOfRange {
                contract: *contract,
                index,
                len: bindings.len(),
            }
            .into()
        })
    }

    /// Number of bindings registered for `contract`.
    pub fn binding_count(&self, contract: &ContractKey) -> usize {
        self.bindings.get(contract).map_or(0, Vec::len)
    }

    /// Returns `true` if `contract` has at least one binding.
    pub fn contains(&self, contract: &ContractKey) -> bool {
        self.binding_count(contract) > 0
    }

    /// Number of contracts with bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// All registered contracts, sorted by name.
    pub fn contracts(&self) -> Vec<ContractKey> {
        let mut keys: Vec<_> = self.bindings.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Renders every contract with its bindings.
    pub fn describe(&self) -> String {
        self.contracts()
            .iter()
            .map(|contract| {
                let rows: Vec<BindingRow> = self.bindings[contract]
                    .iter()
                    .enumerate()
                    .map(|(index, binding)| BindingRow {
                        index,
                        lifecycle: binding.lifecycle.to_string(),
                        implementation: binding.implementation.to_string(),
                    })
                    .collect();
                render_binding_table(contract.type_name(), &rows)
            })
            .collect()
    }

    fn suggestions_for(&self, contract: &ContractKey) -> Vec<String> {
        let available: Vec<&str> = self.bindings.keys().map(|k| k.type_name()).collect();
        suggest_similar(contract.type_name(), &available, 3)
    }
}
