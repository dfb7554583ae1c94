//! Parameter injection.
//!
//! [`Container::invoke`](crate::container::Container::invoke) resolves a
//! function's parameters from the container before calling it. The
//! parameter list is a type implementing [`Dependencies`]: a single
//! `Arc<dyn C>`, an `Option<Arc<dyn C>>`, or a tuple of up to six of them.
//!
//! ```rust,ignore
//! let total = container.invoke(&cx, &Indices::new(), |(db, cache): (Arc<dyn Database>, Option<Arc<dyn Cache>>)| {
//!     db.count() + cache.map_or(0, |c| c.len())
//! })?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::container::Container;
use crate::error::Result;
use crate::implementation::Contract;
use crate::key::ContractKey;
use crate::scope::Context;

/// Binding index to use per contract during injection. Contracts not
/// listed resolve index 0.
#[derive(Debug, Clone, Default)]
pub struct Indices {
    indices: HashMap<ContractKey, usize>,
}

impl Indices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves contract `C` at `index`.
    pub fn with<C: ?Sized + Contract>(mut self, index: usize) -> Self {
        self.indices.insert(ContractKey::of::<C>(), index);
        self
    }

    /// The index configured for `contract`.
    pub fn index_of(&self, contract: &ContractKey) -> usize {
        self.indices.get(contract).copied().unwrap_or(0)
    }
}

/// One injectable parameter.
pub trait Dependency: Sized {
    fn resolve(container: &Container, cx: &Context, indices: &Indices) -> Result<Self>;
}

impl<C: ?Sized + Contract> Dependency for Arc<C> {
    fn resolve(container: &Container, cx: &Context, indices: &Indices) -> Result<Self> {
        container.get_at::<C>(cx, indices.index_of(&ContractKey::of::<C>()))
    }
}

/// Resolves to `None` when the contract has no bindings. Every other
/// failure is still reported.
impl<C: ?Sized + Contract> Dependency for Option<Arc<C>> {
    fn resolve(container: &Container, cx: &Context, indices: &Indices) -> Result<Self> {
        if !container.contains::<C>() {
            return Ok(None);
        }
        <Arc<C> as Dependency>::resolve(container, cx, indices).map(Some)
    }
}

/// A complete parameter list.
pub trait Dependencies: Sized {
    fn resolve(container: &Container, cx: &Context, indices: &Indices) -> Result<Self>;
}

impl<C: ?Sized + Contract> Dependencies for Arc<C> {
    fn resolve(container: &Container, cx: &Context, indices: &Indices) -> Result<Self> {
        <Self as Dependency>::resolve(container, cx, indices)
    }
}

impl<C: ?Sized + Contract> Dependencies for Option<Arc<C>> {
    fn resolve(container: &Container, cx: &Context, indices: &Indices) -> Result<Self> {
        <Self as Dependency>::resolve(container, cx, indices)
    }
}

macro_rules! tuple_dependencies {
    ($($param:ident),+) => {
        impl<$($param: Dependency),+> Dependencies for ($($param,)+) {
            fn resolve(container: &Container, cx: &Context, indices: &Indices) -> Result<Self> {
                Ok(($(<$param as Dependency>::resolve(container, cx, indices)?,)+))
            }
        }
    };
}

tuple_dependencies!(A);
tuple_dependencies!(A, B);
tuple_dependencies!(A, B, C);
tuple_dependencies!(A, B, C, D);
tuple_dependencies!(A, B, C, D, E);
tuple_dependencies!(A, B, C, D, E, F);
