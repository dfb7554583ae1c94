//! Contracts, implementations and the capability marker between them.
//!
//! A contract is any `Send + Sync + 'static` type, in practice a trait
//! object such as `dyn Mailer`. An implementation declares which
//! contracts it satisfies by implementing [`Implements`], usually through
//! the [`implements!`](crate::implements) macro. The container checks
//! this marker at compile time when registering by value, and again at
//! runtime when an implementation arrives type-erased from discovery.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use bindery_support::rendering::bare_type_name;

use crate::args::{ArgError, Args};

/// Boxed error returned by constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Anything that can be used as a contract key and shared across threads.
///
/// Implemented for every `Send + Sync + 'static` type, including trait
/// objects whose trait has `Send + Sync` supertraits.
pub trait Contract: Send + Sync + 'static {}

impl<T: ?Sized + Send + Sync + 'static> Contract for T {}

/// Capability marker: `Self` satisfies contract `C`.
///
/// ```
/// use std::sync::Arc;
/// use bindery_container::implementation::Implements;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// bindery_container::implements!(English => dyn Greeter);
///
/// let greeter: Arc<dyn Greeter> = Arc::new(English).upcast();
/// assert_eq!(greeter.greet(), "hello");
/// ```
pub trait Implements<C: ?Sized>: Send + Sync + 'static {
    /// Converts a shared implementation into the contract.
    fn upcast(self: Arc<Self>) -> Arc<C>;
}

/// Declares that a type implements one or more contracts.
///
/// ```ignore
/// implements!(SmtpMailer => dyn Mailer, dyn HealthCheck);
/// ```
#[macro_export]
macro_rules! implements {
    ($implementation:ty => $($contract:ty),+ $(,)?) => {
        $(
            impl $crate::implementation::Implements<$contract> for $implementation {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$contract> {
                    self
                }
            }
        )+
    };
}

type ConstructFn<C> = Arc<dyn Fn(&Args) -> Result<Arc<C>, BoxError> + Send + Sync>;

/// A concrete implementation of contract `C` together with the way to
/// construct it.
///
/// The container never resolves constructor parameters itself. An
/// implementation is built either through its `Default` impl
/// ([`Implementation::of`]) or through a constructor that reads the
/// caller's [`Args`] ([`Implementation::with_constructor`]).
pub struct Implementation<C: ?Sized> {
    type_id: TypeId,
    type_name: &'static str,
    construct: ConstructFn<C>,
}

impl<C: ?Sized + Contract> Implementation<C> {
    /// Uses `I::default()` as the construction path.
    ///
    /// Passing arguments to a default-constructed implementation is a
    /// construction error.
    pub fn of<I>() -> Self
    where
        I: Implements<C> + Default,
    {
        Self {
            type_id: TypeId::of::<I>(),
            type_name: type_name::<I>(),
            construct: Arc::new(|args: &Args| -> Result<Arc<C>, BoxError> {
                if !args.is_empty() {
                    return Err(ArgError::Unexpected {
                        implementation: type_name::<I>(),
                        given: args.len(),
                    }
                    .into());
                }
                Ok(Arc::new(I::default()).upcast())
            }),
        }
    }

    /// Uses `constructor` to build `I` from the caller's arguments.
    ///
    /// ```
    /// use bindery_container::args::Args;
    /// use bindery_container::implementation::Implementation;
    ///
    /// trait Port: Send + Sync {
    ///     fn number(&self) -> u16;
    /// }
    ///
    /// struct Fixed(u16);
    /// impl Port for Fixed {
    ///     fn number(&self) -> u16 { self.0 }
    /// }
    /// bindery_container::implements!(Fixed => dyn Port);
    ///
    /// let implementation = Implementation::<dyn Port>::with_constructor(|args: &Args| {
    ///     Ok(Fixed(*args.get::<u16>(0)?))
    /// });
    /// assert!(implementation.name().ends_with("Fixed"));
    /// ```
    pub fn with_constructor<I, F>(constructor: F) -> Self
    where
        I: Implements<C>,
        F: Fn(&Args) -> Result<I, BoxError> + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<I>(),
            type_name: type_name::<I>(),
            construct: Arc::new(move |args: &Args| -> Result<Arc<C>, BoxError> {
                Ok(Arc::new(constructor(args)?).upcast())
            }),
        }
    }

    /// [`TypeId`] of the concrete type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified name of the concrete type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Bare name of the concrete type, the one used for name-based
    /// registration.
    pub fn name(&self) -> String {
        bare_type_name(self.type_name)
    }

    /// Builds a new instance.
    pub fn construct(&self, args: &Args) -> Result<Arc<C>, BoxError> {
        (self.construct)(args)
    }

    /// Type-erased constructor for storage in the registry.
    ///
    /// The produced `Arc<dyn Any>` holds an `Arc<C>`.
    pub(crate) fn into_erased_constructor(self) -> ErasedConstructFn {
        let construct = self.construct;
        Arc::new(move |args: &Args| -> Result<ErasedInstance, BoxError> {
            let instance: Arc<C> = construct(args)?;
            Ok(Arc::new(instance) as ErasedInstance)
        })
    }
}

/// A constructed instance with its contract type erased. Always holds an
/// `Arc<C>` for the contract it was built for.
pub(crate) type ErasedInstance = Arc<dyn Any + Send + Sync>;

pub(crate) type ErasedConstructFn =
    Arc<dyn Fn(&Args) -> Result<ErasedInstance, BoxError> + Send + Sync>;

/// An [`Implementation`] whose contract type was erased, as produced by
/// discovery catalog entries.
pub type ErasedImplementation = Box<dyn Any + Send + Sync>;

/// Recovers the typed implementation from an erased one.
///
/// Returns the box unchanged when it was built for another contract.
pub(crate) fn downcast_implementation<C: ?Sized + Contract>(
    erased: ErasedImplementation,
) -> Result<Implementation<C>, ErasedImplementation> {
    erased.downcast::<Implementation<C>>().map(|b| *b)
}

impl<C: ?Sized> Clone for Implementation<C> {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            construct: Arc::clone(&self.construct),
        }
    }
}

impl<C: ?Sized> fmt::Debug for Implementation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("type_name", &self.type_name)
            .field("contract", &type_name::<C>())
            .finish()
    }
}
