//! Error types for Bindery container operations.
//!
//! Every failure of `register`, `get` or discovery is returned to the
//! immediate caller as a [`BinderyError`]. Messages name the contract
//! involved and end with a hint on how to fix the call.

use std::fmt;

use crate::implementation::BoxError;
use crate::key::ContractKey;
use crate::lifecycle::Lifecycle;

/// Main error type for all Bindery operations.
#[derive(Debug, thiserror::Error)]
pub enum BinderyError {
    /// Malformed or inconsistent registration or lookup request.
    #[error("{}", .0)]
    Configuration(ConfigurationError),

    /// Second binding for a contract without override permission.
    #[error("{}", .0)]
    AlreadyRegistered(AlreadyRegisteredError),

    /// Scoped binding requested outside of a scope.
    #[error("{}", .0)]
    NoActiveScope(NoActiveScopeError),

    /// Discovery bootstrap failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The implementation's constructor failed.
    #[error("Failed to construct {contract} using {implementation}: {source}")]
    ConstructionFailed {
        contract: ContractKey,
        implementation: &'static str,
        #[source]
        source: BoxError,
    },
}

/// The error taxonomy, for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Registration,
    Scope,
    Discovery,
    Construction,
}

impl BinderyError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BinderyError::Configuration(_) => ErrorKind::Configuration,
            BinderyError::AlreadyRegistered(_) => ErrorKind::Registration,
            BinderyError::NoActiveScope(_) => ErrorKind::Scope,
            BinderyError::Discovery(_) => ErrorKind::Discovery,
            BinderyError::ConstructionFailed { .. } => ErrorKind::Construction,
        }
    }

    pub(crate) fn construction(
        contract: ContractKey,
        implementation: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        BinderyError::ConstructionFailed {
            contract,
            implementation,
            source: source.into(),
        }
    }
}

impl From<ConfigurationError> for BinderyError {
    fn from(err: ConfigurationError) -> Self {
        BinderyError::Configuration(err)
    }
}

/// Causes of a configuration error.
#[derive(Debug)]
pub enum ConfigurationError {
    /// Neither an implementation nor an implementation name was given.
    MissingImplementation { contract: ContractKey },

    /// Both an implementation and an implementation name were given.
    ConflictingImplementation { contract: ContractKey, name: String },

    /// The implementation does not satisfy the contract.
    ///
    /// [`catalog_entry!`](crate::catalog_entry) always builds a matching
    /// pair; this is raised for hand-built
    /// [`CatalogEntry`](crate::discovery::CatalogEntry) values whose
    /// contract and implementation disagree.
    ContractMismatch {
        contract: ContractKey,
        implementation: &'static str,
    },

    /// Discovery found no implementation with the requested name.
    NoImplementationNamed(NoImplementationNamedError),

    /// Discovery found several distinct implementations with the requested name.
    AmbiguousImplementation(AmbiguousImplementationError),

    /// `get` on a contract without bindings.
    NotRegistered(NotRegisteredError),

    /// `get` with an index past the end of the binding list.
    IndexOutOfRange {
        contract: ContractKey,
        index: usize,
        len: usize,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingImplementation { contract } => {
                write!(f, "No implementation given for {contract}")?;
                write!(f, "\n  Hint: Supply either an implementation or an implementation name")
            }
            ConfigurationError::ConflictingImplementation { contract, name } => {
                write!(
                    f,
                    "Both an implementation and the name {name:?} were given for {contract}"
                )?;
                write!(f, "\n  Hint: Supply an implementation or a name, not both")
            }
            ConfigurationError::ContractMismatch {
                contract,
                implementation,
            } => {
                write!(f, "{implementation} does not implement {contract}")?;
                write!(
                    f,
                    "\n  Hint: Declare the capability with implements!({implementation} => {contract})"
                )
            }
            ConfigurationError::NoImplementationNamed(e) => write!(f, "{e}"),
            ConfigurationError::AmbiguousImplementation(e) => write!(f, "{e}"),
            ConfigurationError::NotRegistered(e) => write!(f, "{e}"),
            ConfigurationError::IndexOutOfRange {
                contract,
                index,
                len,
            } => {
                write!(
                    f,
                    "Index {index} is out of range for {contract} ({len} binding{})",
                    if *len == 1 { "" } else { "s" }
                )?;
                write!(f, "\n  Hint: Register another binding with override enabled")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Error when a contract has no bindings.
///
/// Includes "did you mean?" suggestions from the registered contracts.
#[derive(Debug)]
pub struct NotRegisteredError {
    /// The contract that was requested
    pub requested: ContractKey,
    /// Similar contracts that ARE registered
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No binding registered for {}", self.requested)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Did you forget to call .register::<{}>()?",
            self.requested.type_name()
        )
    }
}

/// Error when name-based registration finds nothing.
#[derive(Debug)]
pub struct NoImplementationNamedError {
    pub contract: ContractKey,
    pub name: String,
    /// Root namespace that was searched
    pub namespace: String,
    /// Names of the implementations discovery did find for the contract
    pub available: Vec<String>,
}

impl fmt::Display for NoImplementationNamedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No implementation named {:?} found for {}",
            self.name, self.contract
        )?;
        if !self.namespace.is_empty() {
            write!(f, " under `{}`", self.namespace)?;
        }

        if !self.available.is_empty() {
            write!(f, "\n  Available:")?;
            for name in &self.available {
                write!(f, "\n    - {name}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Catalog the implementation with catalog!({} => {})",
            self.name,
            self.contract.short_name()
        )
    }
}

/// Error when several distinct implementations share the requested name.
///
/// The container never guesses between them.
#[derive(Debug)]
pub struct AmbiguousImplementationError {
    pub contract: ContractKey,
    pub name: String,
    /// Fully qualified names of every colliding implementation
    pub candidates: Vec<&'static str>,
}

impl fmt::Display for AmbiguousImplementationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ambiguous implementation name {:?} for {}: {} candidates",
            self.name,
            self.contract,
            self.candidates.len()
        )?;
        for candidate in &self.candidates {
            write!(f, "\n    - {candidate}")?;
        }
        write!(
            f,
            "\n  Hint: Register the implementation directly, or narrow the root namespace"
        )
    }
}

/// Error when trying to add a binding to a contract that already has one.
#[derive(Debug)]
pub struct AlreadyRegisteredError {
    pub contract: ContractKey,
    /// Number of bindings already present
    pub existing: usize,
}

impl fmt::Display for AlreadyRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} already has {} registered binding{}",
            self.contract,
            self.existing,
            if self.existing == 1 { "" } else { "s" }
        )?;
        write!(
            f,
            "\n  Hint: Pass allow_override = true to append another binding"
        )
    }
}

/// Error when a scoped binding is requested without an active scope.
#[derive(Debug)]
pub struct NoActiveScopeError {
    pub contract: ContractKey,
    pub lifecycle: Lifecycle,
}

impl fmt::Display for NoActiveScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No active scope while resolving {} ({})",
            self.contract, self.lifecycle
        )?;
        write!(
            f,
            "\n  Hint: Call start_scope() for this context before requesting a scoped binding"
        )
    }
}

/// Error raised while bootstrapping discovery.
///
/// Wraps the underlying cause so the error surface stays the same
/// however the configuration source fails.
#[derive(Debug, thiserror::Error)]
#[error("Discovery failed for namespace `{namespace}`: {reason}")]
pub struct DiscoveryError {
    pub namespace: String,
    pub reason: String,
    #[source]
    pub source: Option<BoxError>,
}

impl DiscoveryError {
    pub(crate) fn new(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Convenient Result type for Bindery operations.
pub type Result<T> = std::result::Result<T, BinderyError>;
