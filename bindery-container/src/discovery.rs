//! Implementation discovery for name-based registration.
//!
//! Implementations become discoverable by being catalogued with
//! [`catalog!`](crate::catalog). Every entry is collected at link time
//! into one process-wide [`Catalog`]. [`Discovery`] then searches that
//! catalog for the implementations of a contract under a root namespace
//! (a module path prefix).
//!
//! # Examples
//! ```
//! use bindery_container::discovery::{Catalog, Discovery};
//! use bindery_container::key::ContractKey;
//!
//! pub trait Notifier: Send + Sync {}
//!
//! #[derive(Default)]
//! pub struct EmailNotifier;
//! impl Notifier for EmailNotifier {}
//!
//! bindery_container::implements!(EmailNotifier => dyn Notifier);
//! bindery_container::catalog!(EmailNotifier => dyn Notifier);
//!
//! fn main() {
//!     let discovery = Discovery::new(Catalog::linked(), "").unwrap();
//!     let found = discovery.find(&[ContractKey::of::<dyn Notifier>()]);
//!     assert_eq!(found.len(), 1);
//!     assert_eq!(found[0].name(), "EmailNotifier");
//! }
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use bindery_support::rendering::bare_type_name;
use once_cell::sync::Lazy;
use tracing::{debug, info, instrument, warn};

use crate::error::{
    AmbiguousImplementationError, ConfigurationError, DiscoveryError, NoImplementationNamedError,
    Result,
};
use crate::implementation::ErasedImplementation;
use crate::key::ContractKey;

/// One catalogued implementation of one contract.
///
/// Built by [`catalog_entry!`](crate::catalog_entry); every field is a
/// constant so entries can live in statics.
pub struct CatalogEntry {
    contract: fn() -> ContractKey,
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    module_path: &'static str,
    implementation: fn() -> ErasedImplementation,
}

impl CatalogEntry {
    #[doc(hidden)]
    pub const fn new(
        contract: fn() -> ContractKey,
        type_id: fn() -> TypeId,
        type_name: fn() -> &'static str,
        module_path: &'static str,
        implementation: fn() -> ErasedImplementation,
    ) -> Self {
        Self {
            contract,
            type_id,
            type_name,
            module_path,
            implementation,
        }
    }

    /// The contract this entry implements.
    pub fn contract(&self) -> ContractKey {
        (self.contract)()
    }

    /// [`TypeId`] of the implementation.
    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Fully qualified name of the implementation type.
    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Bare name of the implementation type.
    pub fn name(&self) -> String {
        bare_type_name(self.type_name())
    }

    /// Module in which the entry was catalogued.
    pub fn module_path(&self) -> &'static str {
        self.module_path
    }

    /// Catalogue module joined with the bare implementation name.
    pub fn qualified_path(&self) -> String {
        format!("{}::{}", self.module_path, self.name())
    }

    /// Builds the erased `Implementation<C>` for this entry's contract.
    pub fn implementation(&self) -> ErasedImplementation {
        (self.implementation)()
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("contract", &self.contract())
            .field("implementation", &self.type_name())
            .field("module_path", &self.module_path)
            .finish()
    }
}

inventory::collect!(CatalogEntry);

/// Builds a [`CatalogEntry`] constant.
///
/// The single-type form constructs the implementation with `Default`;
/// the second form takes a constructor `Fn(&Args) -> Result<I, BoxError>`.
///
/// ```ignore
/// static ENTRY: CatalogEntry = catalog_entry!(SmtpMailer => dyn Mailer);
/// static WITH_ARGS: CatalogEntry = catalog_entry!(Pool => dyn Database, Pool::from_args);
/// ```
#[macro_export]
macro_rules! catalog_entry {
    ($implementation:ty => $contract:ty) => {{
        fn __bindery_implementation() -> $crate::implementation::ErasedImplementation {
            ::std::boxed::Box::new(
                $crate::implementation::Implementation::<$contract>::of::<$implementation>(),
            )
        }
        $crate::discovery::CatalogEntry::new(
            $crate::key::ContractKey::of::<$contract>,
            ::std::any::TypeId::of::<$implementation>,
            ::std::any::type_name::<$implementation>,
            ::std::module_path!(),
            __bindery_implementation,
        )
    }};
    ($implementation:ty => $contract:ty, $constructor:expr) => {{
        fn __bindery_implementation() -> $crate::implementation::ErasedImplementation {
            ::std::boxed::Box::new(
                $crate::implementation::Implementation::<$contract>::with_constructor::<
                    $implementation,
                    _,
                >($constructor),
            )
        }
        $crate::discovery::CatalogEntry::new(
            $crate::key::ContractKey::of::<$contract>,
            ::std::any::TypeId::of::<$implementation>,
            ::std::any::type_name::<$implementation>,
            ::std::module_path!(),
            __bindery_implementation,
        )
    }};
}

/// Catalogues an implementation in the link-time [`Catalog`].
///
/// Takes the same arguments as [`catalog_entry!`](crate::catalog_entry).
#[macro_export]
macro_rules! catalog {
    ($($entry:tt)+) => {
        $crate::inventory::submit! {
            $crate::catalog_entry!($($entry)+)
        }
    };
}

/// A set of catalogued implementations.
///
/// [`Catalog::linked`] holds everything submitted with
/// [`catalog!`](crate::catalog) in the running binary. Hand-built
/// catalogs are useful to restrict discovery to a known set.
#[derive(Clone, Default)]
pub struct Catalog {
    entries: Vec<&'static CatalogEntry>,
}

static LINKED: Lazy<Catalog> = Lazy::new(|| {
    let mut catalog = Catalog::new();
    for entry in inventory::iter::<CatalogEntry> {
        catalog.push(entry);
    }
    info!(entries = catalog.len(), "Collected implementation catalog");
    catalog
});

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog of every entry linked into this binary.
    ///
    /// Collected on first use and shared afterwards.
    pub fn linked() -> &'static Catalog {
        &LINKED
    }

    /// Adds an entry.
    pub fn with(mut self, entry: &'static CatalogEntry) -> Self {
        self.push(entry);
        self
    }

    /// Adds an entry in place.
    pub fn push(&mut self, entry: &'static CatalogEntry) {
        self.entries.push(entry);
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[&'static CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Searches a [`Catalog`] under a root namespace.
#[derive(Debug, Clone)]
pub struct Discovery<'a> {
    catalog: &'a Catalog,
    root: String,
    excluded: Vec<String>,
}

impl<'a> Discovery<'a> {
    /// Creates a search over `catalog` restricted to modules at or below
    /// `root`. An empty root searches the whole catalog.
    ///
    /// # Errors
    /// [`DiscoveryError`] if `root` is not a module path.
    pub fn new(catalog: &'a Catalog, root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if !is_module_path(&root) {
            return Err(DiscoveryError::new(root, "not a module path").into());
        }
        Ok(Self {
            catalog,
            root,
            excluded: Vec::new(),
        })
    }

    /// Skips entries catalogued in `module` or below it.
    pub fn exclude_module(mut self, module: impl Into<String>) -> Self {
        self.excluded.push(module.into());
        self
    }

    /// The root namespace searched.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Finds every distinct implementation of any of `contracts`.
    ///
    /// The same implementation catalogued several times is returned once,
    /// using the entry with the longest qualified path. Results are sorted
    /// by implementation type name.
    #[instrument(skip(self, contracts), fields(root = %self.root, contracts = contracts.len()))]
    pub fn find(&self, contracts: &[ContractKey]) -> Vec<&'static CatalogEntry> {
        let mut distinct: HashMap<TypeId, &'static CatalogEntry> = HashMap::new();

        for &entry in self.catalog.entries() {
            if !in_namespace(entry.module_path(), &self.root) {
                continue;
            }
            if self
                .excluded
                .iter()
                .any(|module| in_namespace(entry.module_path(), module))
            {
                debug!(module = entry.module_path(), "Skipping excluded module");
                continue;
            }
            if !contracts.contains(&entry.contract()) {
                continue;
            }

            distinct
                .entry(entry.type_id())
                .and_modify(|kept| {
                    if entry.qualified_path().len() > kept.qualified_path().len() {
                        *kept = entry;
                    }
                })
                .or_insert(entry);
        }

        let mut found: Vec<_> = distinct.into_values().collect();
        found.sort_by(|a, b| {
            a.type_name()
                .cmp(b.type_name())
                .then_with(|| a.module_path().cmp(b.module_path()))
        });
        debug!(found = found.len(), "Discovery finished");
        found
    }

    /// Finds the single implementation of `contract` whose bare name is
    /// `name`.
    ///
    /// # Errors
    /// Configuration errors when nothing matches, or when several distinct
    /// implementations share the name.
    pub fn find_named(&self, contract: ContractKey, name: &str) -> Result<&'static CatalogEntry> {
        let found = self.find(&[contract]);
        let mut matching: Vec<_> = found.iter().copied().filter(|e| e.name() == name).collect();

        match matching.len() {
            1 => Ok(matching.remove(0)),
            0 => Err(ConfigurationError::NoImplementationNamed(NoImplementationNamedError {
                contract,
                name: name.to_string(),
                namespace: self.root.clone(),
                available: found.iter().map(|e| e.name()).collect(),
            })
            .into()),
            _ => {
                let candidates: Vec<&'static str> = matching.iter().map(|e| e.type_name()).collect();
                warn!(
                    contract = %contract,
                    name,
                    candidates = ?candidates,
                    "Ambiguous implementation name"
                );
                Err(ConfigurationError::AmbiguousImplementation(AmbiguousImplementationError {
                    contract,
                    name: name.to_string(),
                    candidates,
                })
                .into())
            }
        }
    }
}

/// Returns `true` if `module` is `root` or nested below it.
pub(crate) fn in_namespace(module: &str, root: &str) -> bool {
    root.is_empty()
        || module == root
        || module
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with("::"))
}

pub(crate) fn is_module_path(path: &str) -> bool {
    path.is_empty()
        || path.split("::").all(|segment| {
            !segment.is_empty()
                && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
                && !segment.starts_with(|c: char| c.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;
    use crate::error::BinderyError;
    use crate::implementation::downcast_implementation;

    pub trait Transport: Send + Sync {
        fn kind(&self) -> &'static str;
    }

    pub trait Codec: Send + Sync {}

    mod tcp {
        use super::Transport;

        #[derive(Default)]
        pub struct Tcp;
        impl Transport for Tcp {
            fn kind(&self) -> &'static str {
                "tcp"
            }
        }
        crate::implements!(Tcp => dyn Transport);

        pub static ENTRY: crate::discovery::CatalogEntry = crate::catalog_entry!(Tcp => dyn Transport);
    }

    mod udp {
        use super::{Codec, Transport};

        #[derive(Default)]
        pub struct Udp;
        impl Transport for Udp {
            fn kind(&self) -> &'static str {
                "udp"
            }
        }
        impl Codec for Udp {}
        crate::implements!(Udp => dyn Transport, dyn Codec);

        pub static ENTRY: crate::discovery::CatalogEntry = crate::catalog_entry!(Udp => dyn Transport);
        pub static CODEC_ENTRY: crate::discovery::CatalogEntry = crate::catalog_entry!(Udp => dyn Codec);

        pub mod reexport {
            pub use super::Udp;

            pub static ENTRY: crate::discovery::CatalogEntry =
                crate::catalog_entry!(Udp => dyn super::super::Transport);
        }
    }

    mod legacy {
        use super::Transport;

        pub struct Tcp {
            pub port: u16,
        }
        impl Transport for Tcp {
            fn kind(&self) -> &'static str {
                "legacy tcp"
            }
        }
        crate::implements!(Tcp => dyn Transport);

        pub static ENTRY: crate::discovery::CatalogEntry =
            crate::catalog_entry!(Tcp => dyn Transport, |args: &crate::args::Args| {
                Ok(Tcp { port: *args.get::<u16>(0)? })
            });
    }

    fn catalog() -> Catalog {
        Catalog::new()
            .with(&tcp::ENTRY)
            .with(&udp::ENTRY)
            .with(&udp::CODEC_ENTRY)
            .with(&udp::reexport::ENTRY)
    }

    fn here() -> String {
        module_path!().to_string()
    }

    #[test]
    fn finds_implementations_of_contract() {
        let catalog = catalog();
        let discovery = Discovery::new(&catalog, here()).unwrap();
        let found = discovery.find(&[ContractKey::of::<dyn Transport>()]);

        let names: Vec<_> = found.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Tcp", "Udp"]);
    }

    #[test]
    fn same_type_collapses_to_longest_path() {
        let catalog = catalog();
        let discovery = Discovery::new(&catalog, "").unwrap();
        let found = discovery.find(&[ContractKey::of::<dyn Transport>()]);

        let udp = found.iter().find(|e| e.name() == "Udp").unwrap();
        assert!(udp.module_path().ends_with("udp::reexport"));
    }

    #[test]
    fn multiple_contracts_query() {
        let catalog = catalog();
        let discovery = Discovery::new(&catalog, here()).unwrap();
        let found = discovery.find(&[ContractKey::of::<dyn Codec>(), ContractKey::of::<dyn Transport>()]);
        assert_eq!(found.len(), 2);

        let codecs = discovery.find(&[ContractKey::of::<dyn Codec>()]);
        assert_eq!(codecs.len(), 1);
    }

    #[test]
    fn root_namespace_filters_modules() {
        let catalog = catalog();
        let root = format!("{}::tcp", here());
        let discovery = Discovery::new(&catalog, root).unwrap();
        let found = discovery.find(&[ContractKey::of::<dyn Transport>()]);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "Tcp");
    }

    #[test]
    fn prefix_must_end_at_segment_boundary() {
        assert!(in_namespace("app::net", "app"));
        assert!(in_namespace("app", "app"));
        assert!(!in_namespace("application::net", "app"));
        assert!(in_namespace("anything", ""));
    }

    #[test]
    fn excluded_module_is_skipped() {
        let catalog = catalog();
        let discovery = Discovery::new(&catalog, here())
            .unwrap()
            .exclude_module(format!("{}::tcp", here()));
        let found = discovery.find(&[ContractKey::of::<dyn Transport>()]);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "Udp");
    }

    #[test]
    fn invalid_root_is_discovery_error() {
        let catalog = catalog();
        match Discovery::new(&catalog, "app::/src") {
            Err(BinderyError::Discovery(e)) => assert_eq!(e.namespace, "app::/src"),
            other => panic!("Expected Discovery error, got: {other:?}"),
        }
        assert!(Discovery::new(&catalog, "app::").is_err());
    }

    #[test]
    fn find_named_single_match() {
        let catalog = catalog();
        let discovery = Discovery::new(&catalog, here()).unwrap();
        let entry = discovery
            .find_named(ContractKey::of::<dyn Transport>(), "Tcp")
            .unwrap();

        let implementation = downcast_implementation::<dyn Transport>(entry.implementation()).unwrap();
        assert_eq!(implementation.construct(&Args::new()).unwrap().kind(), "tcp");
    }

    #[test]
    fn find_named_missing() {
        let catalog = catalog();
        let discovery = Discovery::new(&catalog, here()).unwrap();

        match discovery.find_named(ContractKey::of::<dyn Transport>(), "Quic") {
            Err(BinderyError::Configuration(ConfigurationError::NoImplementationNamed(e))) => {
                assert_eq!(e.name, "Quic");
                assert_eq!(e.available, vec!["Tcp".to_string(), "Udp".to_string()]);
            }
            other => panic!("Expected NoImplementationNamed, got: {other:?}"),
        }
    }

    #[test]
    fn distinct_types_with_same_name_are_ambiguous() {
        let catalog = catalog().with(&legacy::ENTRY);
        let discovery = Discovery::new(&catalog, here()).unwrap();

        match discovery.find_named(ContractKey::of::<dyn Transport>(), "Tcp") {
            Err(BinderyError::Configuration(ConfigurationError::AmbiguousImplementation(e))) => {
                assert_eq!(e.candidates.len(), 2);
                assert!(e.candidates.iter().any(|c| c.contains("legacy")));
            }
            other => panic!("Expected AmbiguousImplementation, got: {other:?}"),
        }
    }

    #[test]
    fn entry_with_constructor() {
        let entry = &legacy::ENTRY;
        let implementation = downcast_implementation::<dyn Transport>(entry.implementation()).unwrap();

        assert!(implementation.construct(&Args::new()).is_err());
        let transport = implementation.construct(&Args::new().arg(7u16)).unwrap();
        assert_eq!(transport.kind(), "legacy tcp");
    }
}
