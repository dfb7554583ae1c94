//! # Bindery: an inversion-of-control container for Rust
//!
//! Contracts are trait objects, implementations declare the contracts
//! they satisfy with [`implements!`], and the [`Container`] hands out
//! shared or fresh instances according to each binding's [`Lifecycle`].
//!
//! ```rust
//! use bindery::prelude::*;
//! use std::sync::Arc;
//!
//! pub trait Repository: Send + Sync {
//!     fn find(&self, id: u32) -> String;
//! }
//!
//! #[derive(Default)]
//! pub struct MemoryRepository;
//!
//! impl Repository for MemoryRepository {
//!     fn find(&self, id: u32) -> String { format!("user-{id}") }
//! }
//!
//! bindery::implements!(MemoryRepository => dyn Repository);
//!
//! let mut container = Container::with_settings(Settings::default());
//! container.register(Implementation::<dyn Repository>::of::<MemoryRepository>(), Lifecycle::Scoped, false)?;
//!
//! let cx = Context::new();
//! let user = container.with_scope(&cx, |c| {
//!     c.get::<dyn Repository>(&cx).map(|repo| repo.find(7))
//! })?;
//! assert_eq!(user, "user-7");
//! # Ok::<(), bindery::BinderyError>(())
//! ```

pub use bindery_container::*;
pub use bindery_support::{logging, rendering};
