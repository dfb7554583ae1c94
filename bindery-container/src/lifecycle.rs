//! Binding lifecycles.
//!
//! A lifecycle decides whether `get` hands out a shared or a fresh
//! instance:
//! - [`Lifecycle::Singleton`]: one instance per binding for the life of the container
//! - [`Lifecycle::Transient`]: new instance on every `get`
//! - [`Lifecycle::Scoped`]: one instance per active scope

use std::fmt;
use std::str::FromStr;

/// Instance reuse policy of a binding.
///
/// # Examples
/// ```
/// use bindery_container::lifecycle::Lifecycle;
///
/// assert_eq!(Lifecycle::default(), Lifecycle::Singleton);
/// assert_eq!("scoped".parse::<Lifecycle>().unwrap(), Lifecycle::Scoped);
/// assert!(!Lifecycle::Transient.is_cached());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    /// One instance shared for the whole life of the container.
    ///
    /// Created on first `get`. Constructor arguments are only used for
    /// that first construction.
    ///
    /// # When to use
    /// - Connection pools
    /// - Configuration objects
    /// - Shared caches
    #[default]
    Singleton,

    /// New instance created on every `get`.
    ///
    /// # When to use
    /// - Lightweight stateless services
    /// - Objects with mutable state that shouldn't be shared
    Transient,

    /// One instance per scope (e.g., per inbound request).
    ///
    /// Requires an active scope for the caller's context. The instance
    /// is dropped from the cache when the scope ends.
    ///
    /// # When to use
    /// - Per-request transactions
    /// - Request-specific loggers
    Scoped,
}

impl Lifecycle {
    /// Returns `true` if instances of this lifecycle are cached.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifecycle::Singleton | Lifecycle::Scoped)
    }

    /// Returns `true` if resolving requires an active scope.
    #[inline]
    pub fn requires_scope(&self) -> bool {
        matches!(self, Lifecycle::Scoped)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Singleton => write!(f, "Singleton"),
            Lifecycle::Transient => write!(f, "Transient"),
            Lifecycle::Scoped => write!(f, "Scoped"),
        }
    }
}

/// Error returned when parsing an unknown lifecycle name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown lifecycle `{0}` (expected singleton, transient or scoped)")]
pub struct ParseLifecycleError(String);

impl FromStr for Lifecycle {
    type Err = ParseLifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "singleton" => Ok(Lifecycle::Singleton),
            "transient" => Ok(Lifecycle::Transient),
            "scoped" => Ok(Lifecycle::Scoped),
            _ => Err(ParseLifecycleError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_is_default() {
        assert_eq!(Lifecycle::default(), Lifecycle::Singleton);
    }

    #[test]
    fn lifecycle_is_cached() {
        assert!(Lifecycle::Singleton.is_cached());
        assert!(Lifecycle::Scoped.is_cached());
        assert!(!Lifecycle::Transient.is_cached());
    }

    #[test]
    fn only_scoped_requires_scope() {
        assert!(Lifecycle::Scoped.requires_scope());
        assert!(!Lifecycle::Singleton.requires_scope());
        assert!(!Lifecycle::Transient.requires_scope());
    }

    #[test]
    fn lifecycle_display() {
        assert_eq!(format!("{}", Lifecycle::Singleton), "Singleton");
        assert_eq!(format!("{}", Lifecycle::Scoped), "Scoped");
        assert_eq!(format!("{}", Lifecycle::Transient), "Transient");
    }

    #[test]
    fn lifecycle_parse() {
        assert_eq!("Singleton".parse::<Lifecycle>(), Ok(Lifecycle::Singleton));
        assert_eq!(" transient ".parse::<Lifecycle>(), Ok(Lifecycle::Transient));
        assert!("request".parse::<Lifecycle>().is_err());
    }
}
