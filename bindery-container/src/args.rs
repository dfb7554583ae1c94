//! Constructor arguments.
//!
//! [`Args`] carries the caller-supplied argument list that `get_with`
//! passes to an implementation's constructor. Arguments are stored
//! type-erased and read back by position or by name.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;

struct ArgValue {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ArgValue {
    fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    fn downcast<T: 'static>(&self, at: impl FnOnce() -> String) -> Result<&T, ArgError> {
        self.value.downcast_ref::<T>().ok_or_else(|| ArgError::WrongType {
            at: at(),
            expected: type_name::<T>(),
            actual: self.type_name,
        })
    }
}

/// Error reading an argument inside a constructor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgError {
    /// No argument at this position.
    #[error("missing argument #{position}")]
    Missing { position: usize },

    /// No argument with this name.
    #[error("missing argument `{name}`")]
    MissingNamed { name: String },

    /// The argument exists but holds another type.
    #[error("argument {at} is {actual}, expected {expected}")]
    WrongType {
        at: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The implementation only has a default constructor.
    #[error("{implementation} takes no arguments, {given} given")]
    Unexpected {
        implementation: &'static str,
        given: usize,
    },
}

/// Positional and named constructor arguments.
///
/// # Examples
/// ```
/// use bindery_container::args::Args;
///
/// let args = Args::new().arg(8080u16).named("host", "localhost".to_string());
///
/// assert_eq!(*args.get::<u16>(0).unwrap(), 8080);
/// assert_eq!(args.get_named::<String>("host").unwrap(), "localhost");
/// assert!(args.get::<u16>(1).is_err());
/// ```
#[derive(Default)]
pub struct Args {
    positional: Vec<ArgValue>,
    named: HashMap<String, ArgValue>,
}

impl Args {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.positional.push(ArgValue::new(value));
        self
    }

    /// Adds a named argument, replacing any previous value for `name`.
    pub fn named<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.named.insert(name.into(), ArgValue::new(value));
        self
    }

    /// Reads the positional argument at `position`.
    pub fn get<T: 'static>(&self, position: usize) -> Result<&T, ArgError> {
        self.positional
            .get(position)
            .ok_or(ArgError::Missing { position })?
            .downcast(|| format!("#{position}"))
    }

    /// Reads the named argument `name`.
    pub fn get_named<T: 'static>(&self, name: &str) -> Result<&T, ArgError> {
        self.named
            .get(name)
            .ok_or_else(|| ArgError::MissingNamed {
                name: name.to_string(),
            })?
            .downcast(|| format!("`{name}`"))
    }

    /// Reads an optional positional argument.
    ///
    /// Returns `Ok(None)` when the position is absent, but still fails on
    /// a type mismatch.
    pub fn get_opt<T: 'static>(&self, position: usize) -> Result<Option<&T>, ArgError> {
        match self.positional.get(position) {
            Some(value) => value.downcast(|| format!("#{position}")).map(Some),
            None => Ok(None),
        }
    }

    /// Total number of arguments, positional and named.
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// Returns `true` if no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positional: Vec<_> = self.positional.iter().map(|a| a.type_name).collect();
        let named: HashMap<_, _> = self
            .named
            .iter()
            .map(|(k, v)| (k.as_str(), v.type_name))
            .collect();
        f.debug_struct("Args")
            .field("positional", &positional)
            .field("named", &named)
            .finish()
    }
}
