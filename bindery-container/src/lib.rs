//! Core of the Bindery inversion-of-control container.

pub mod args;
mod cache;
pub mod container;
pub mod discovery;
pub mod error;
pub mod implementation;
pub mod inject;
pub mod key;
pub mod lifecycle;
pub mod module;
pub mod registry;
pub mod scope;
pub mod settings;

pub use container::{Container, ContainerBuilder, ScopeGuard, prelude};
pub use error::{BinderyError, ErrorKind, Result};
pub use key::ContractKey;
pub use lifecycle::Lifecycle;
pub use scope::{Context, ScopeId};

#[doc(hidden)]
pub use inventory;
