//! Instance cache for singleton and scoped bindings.
//!
//! Singletons are keyed by (contract, binding index) and live as long as
//! the cache. Scoped instances live in one bucket per scope, keyed by
//! contract, and are dropped together when the scope ends.
//!
//! Constructors run without any map lock held, so they may call back
//! into the container. Two threads missing the same key at once may both
//! construct; the first insert wins and every caller receives that
//! instance.

use std::collections::HashMap;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

use crate::implementation::ErasedInstance;
use crate::key::ContractKey;
use crate::scope::ScopeId;

#[derive(Debug, Default)]
pub(crate) struct InstanceCache {
    singletons: DashMap<(ContractKey, usize), ErasedInstance>,
    scoped: DashMap<ScopeId, HashMap<ContractKey, ErasedInstance>>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the singleton for `(contract, index)`, constructing it with
    /// `make` on first access.
    pub fn singleton<E>(
        &self,
        contract: ContractKey,
        index: usize,
        make: impl FnOnce() -> Result<ErasedInstance, E>,
    ) -> Result<ErasedInstance, E> {
        let key = (contract, index);
        if let Some(hit) = self.singletons.get(&key) {
            trace!(contract = %contract, index, "Singleton cache hit");
            return Ok(hit.value().clone());
        }

        let created = make()?;
        let stored = self.singletons.entry(key).or_insert(created).value().clone();
        trace!(contract = %contract, index, "Singleton cached");
        Ok(stored)
    }

    /// Opens an empty bucket for `scope`.
    pub fn open_scope(&self, scope: ScopeId) {
        self.scoped.insert(scope, HashMap::new());
    }

    /// Drops the bucket of `scope`, returning how many instances it held.
    pub fn close_scope(&self, scope: ScopeId) -> Option<usize> {
        self.scoped.remove(&scope).map(|(_, bucket)| bucket.len())
    }

    /// Returns the instance of `contract` within `scope`, constructing it
    /// with `make` on first access in that scope.
    ///
    /// Buckets are only created by [`open_scope`](Self::open_scope); an
    /// instance built for a scope that is no longer open is returned
    /// uncached.
    pub fn scoped<E>(
        &self,
        scope: ScopeId,
        contract: ContractKey,
        make: impl FnOnce() -> Result<ErasedInstance, E>,
    ) -> Result<ErasedInstance, E> {
        if let Some(hit) = self
            .scoped
            .get(&scope)
            .and_then(|bucket| bucket.get(&contract).cloned())
        {
            trace!(contract = %contract, scope = %scope, "Scoped cache hit");
            return Ok(hit);
        }

        let created = make()?;
        let stored = match self.scoped.entry(scope) {
            Entry::Occupied(mut bucket) => bucket
                .get_mut()
                .entry(contract)
                .or_insert(created)
                .clone(),
            // The scope closed while `make` ran; nothing is left to cache into.
            Entry::Vacant(_) => {
                trace!(contract = %contract, scope = %scope, "Scope closed during construction");
                return Ok(created);
            }
        };
        trace!(contract = %contract, scope = %scope, "Scoped instance cached");
        Ok(stored)
    }

    /// Whether `scope` has an open bucket.
    pub fn is_open(&self, scope: ScopeId) -> bool {
        self.scoped.contains_key(&scope)
    }

    /// Number of cached singletons.
    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    /// Number of open scope buckets.
    pub fn scope_count(&self) -> usize {
        self.scoped.len()
    }

    /// Number of instances cached in `scope`.
    #[cfg(test)]
    pub fn scoped_count(&self, scope: ScopeId) -> usize {
        self.scoped.get(&scope).map_or(0, |bucket| bucket.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;

    trait Repo: Send + Sync {}

    fn instance(value: u32) -> Result<ErasedInstance, Infallible> {
        Ok(Arc::new(value) as ErasedInstance)
    }

    fn key() -> ContractKey {
        ContractKey::of::<dyn Repo>()
    }

    #[test]
    fn singleton_constructed_once() {
        let cache = InstanceCache::new();
        let mut calls = 0;

        let a = cache
            .singleton(key(), 0, || {
                calls += 1;
                instance(1)
            })
            .unwrap();
        let b = cache.singleton(key(), 0, || instance(2)).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls, 1);
        assert_eq!(*b.downcast_ref::<u32>().unwrap(), 1);
    }

    #[test]
    fn singleton_keyed_by_index() {
        let cache = InstanceCache::new();
        let a = cache.singleton(key(), 0, || instance(1)).unwrap();
        let b = cache.singleton(key(), 1, || instance(2)).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.singleton_count(), 2);
    }

    #[test]
    fn failed_construction_caches_nothing() {
        let cache = InstanceCache::new();
        let result: Result<ErasedInstance, &str> = cache.singleton(key(), 0, || Err("boom"));

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(cache.singleton_count(), 0);
    }

    #[test]
    fn scoped_reused_within_scope_only() {
        let cache = InstanceCache::new();
        let first = ScopeId::next();
        let second = ScopeId::next();
        cache.open_scope(first);
        cache.open_scope(second);

        let a = cache.scoped(first, key(), || instance(1)).unwrap();
        let b = cache.scoped(first, key(), || instance(2)).unwrap();
        let c = cache.scoped(second, key(), || instance(3)).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.scoped_count(first), 1);
    }

    #[test]
    fn closing_scope_drops_bucket() {
        let cache = InstanceCache::new();
        let scope = ScopeId::next();
        cache.open_scope(scope);
        let a = cache.scoped(scope, key(), || instance(1)).unwrap();

        assert_eq!(cache.close_scope(scope), Some(1));
        assert_eq!(cache.close_scope(scope), None);
        assert_eq!(cache.scope_count(), 0);

        assert!(!cache.is_open(scope));

        // A bucket reopened under the same id starts empty.
        cache.open_scope(scope);
        let b = cache.scoped(scope, key(), || instance(2)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn closed_scope_is_not_recreated() {
        let cache = InstanceCache::new();
        let scope = ScopeId::next();

        let a = cache.scoped(scope, key(), || instance(1)).unwrap();
        let b = cache.scoped(scope, key(), || instance(2)).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.scope_count(), 0);
    }

    #[test]
    fn racing_singleton_keeps_first_insert() {
        let cache = Arc::new(InstanceCache::new());
        let barrier = Arc::new(std::sync::Barrier::new(4));

        let workers: Vec<_> = (0..4u32)
            .map(|n| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    cache
                        .singleton(key(), 0, || {
                            barrier.wait();
                            instance(n)
                        })
                        .unwrap()
                })
            })
            .collect();

        let instances: Vec<ErasedInstance> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(cache.singleton_count(), 1);
    }
}
