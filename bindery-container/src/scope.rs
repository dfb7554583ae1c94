//! Execution contexts and the scope registry.
//!
//! A [`Context`] identifies one logical execution context (a request
//! handler, a worker task, a thread). Each context has at most one
//! active scope, identified by a [`ScopeId`]. Scope-sensitive container
//! calls take the context explicitly; [`Context::current`] offers an
//! ambient, thread- or task-bound context for code that prefers it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Unique identifier of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Generates a fresh, process-unique scope id.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// Handle of one logical execution context.
///
/// Contexts are cheap to copy and compare. Two different contexts never
/// share a scope, even when they run on the same thread.
///
/// # Examples
/// ```
/// use bindery_container::scope::Context;
///
/// let a = Context::new();
/// let b = Context::new();
/// assert_ne!(a, b);
///
/// // The ambient context is stable within one thread.
/// assert_eq!(Context::current(), Context::current());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Context(u64);

thread_local! {
    static THREAD_CONTEXT: Context = Context::new();
}

#[cfg(feature = "async")]
tokio::task_local! {
    static TASK_CONTEXT: Context;
}

impl Context {
    /// Creates a new, unique context.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }

    /// The ambient context of the caller.
    ///
    /// Inside a future run through [`Context::scope`] this is the task's
    /// context; otherwise it is a context bound to the current thread.
    pub fn current() -> Self {
        task_context().unwrap_or_else(|| THREAD_CONTEXT.with(|cx| *cx))
    }

    /// Runs `future` with `self` as its ambient context, on whichever
    /// worker thread it is polled.
    #[cfg(feature = "async")]
    pub async fn scope<F: std::future::Future>(self, future: F) -> F::Output {
        TASK_CONTEXT.scope(self, future).await
    }
}

#[cfg(feature = "async")]
fn task_context() -> Option<Context> {
    TASK_CONTEXT.try_with(|cx| *cx).ok()
}

#[cfg(not(feature = "async"))]
fn task_context() -> Option<Context> {
    None
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

/// Tracks the current scope of every context.
#[derive(Debug, Default)]
pub(crate) struct ScopeRegistry {
    current: DashMap<Context, ScopeId>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `scope` as current for `cx`, returning the scope it replaced.
    pub fn start(&self, cx: &Context, scope: ScopeId) -> Option<ScopeId> {
        self.current.insert(*cx, scope)
    }

    /// Clears the current scope of `cx` and returns it.
    pub fn end(&self, cx: &Context) -> Option<ScopeId> {
        self.current.remove(cx).map(|(_, scope)| scope)
    }

    /// Clears `scope` from `cx` only if it is still current, putting
    /// `previous` back in its place.
    ///
    /// Returns `false` when another scope has become current since.
    pub fn finish(&self, cx: &Context, scope: ScopeId, previous: Option<ScopeId>) -> bool {
        match self.current.entry(*cx) {
            Entry::Occupied(mut marker) if *marker.get() == scope => {
                match previous {
                    Some(previous) => {
                        marker.insert(previous);
                    }
                    None => {
                        marker.remove();
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// The current scope of `cx`.
    pub fn current(&self, cx: &Context) -> Option<ScopeId> {
        self.current.get(cx).map(|scope| *scope)
    }

    /// Number of contexts with an active scope.
    pub fn active(&self) -> usize {
        self.current.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_ids_unique() {
        let s1 = ScopeId::next();
        let s2 = ScopeId::next();
        let s3 = ScopeId::next();

        assert_ne!(s1, s2);
        assert_ne!(s2, s3);
    }

    #[test]
    fn scope_display() {
        assert!(format!("{}", ScopeId::next()).starts_with("scope-"));
        assert!(format!("{}", Context::new()).starts_with("context-"));
    }

    #[test]
    fn start_end_round_trip() {
        let registry = ScopeRegistry::new();
        let cx = Context::new();
        assert_eq!(registry.current(&cx), None);

        let scope = ScopeId::next();
        assert_eq!(registry.start(&cx, scope), None);
        assert_eq!(registry.current(&cx), Some(scope));

        assert_eq!(registry.end(&cx), Some(scope));
        assert_eq!(registry.current(&cx), None);
        assert_eq!(registry.end(&cx), None);
    }

    #[test]
    fn restart_replaces_marker() {
        let registry = ScopeRegistry::new();
        let cx = Context::new();

        let first = ScopeId::next();
        let second = ScopeId::next();
        registry.start(&cx, first);
        let replaced = registry.start(&cx, second);

        assert_eq!(replaced, Some(first));
        assert_eq!(registry.current(&cx), Some(second));
        assert_eq!(registry.active(), 1);
    }

    #[test]
    fn contexts_are_independent() {
        let registry = ScopeRegistry::new();
        let a = Context::new();
        let b = Context::new();

        let scope = ScopeId::next();
        registry.start(&a, scope);
        assert_eq!(registry.current(&a), Some(scope));
        assert_eq!(registry.current(&b), None);
    }

    #[test]
    fn finish_restores_outer_scope() {
        let registry = ScopeRegistry::new();
        let cx = Context::new();
        let outer = ScopeId::next();
        let inner = ScopeId::next();

        registry.start(&cx, outer);
        let previous = registry.start(&cx, inner);

        assert!(registry.finish(&cx, inner, previous));
        assert_eq!(registry.current(&cx), Some(outer));

        assert!(registry.finish(&cx, outer, None));
        assert_eq!(registry.current(&cx), None);
        assert_eq!(registry.active(), 0);
    }

    #[test]
    fn finish_leaves_newer_scope_alone() {
        let registry = ScopeRegistry::new();
        let cx = Context::new();
        let stale = ScopeId::next();
        let newer = ScopeId::next();

        registry.start(&cx, stale);
        registry.start(&cx, newer);

        assert!(!registry.finish(&cx, stale, None));
        assert_eq!(registry.current(&cx), Some(newer));
        assert!(!registry.finish(&Context::new(), newer, None));
    }

    #[test]
    fn thread_contexts_differ() {
        let here = Context::current();
        let there = std::thread::spawn(Context::current).join().unwrap();
        assert_ne!(here, there);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn task_context_overrides_thread_context() {
        let cx = Context::new();
        let seen = cx.scope(async { Context::current() }).await;
        assert_eq!(seen, cx);
        assert_ne!(Context::current(), cx);
    }
}
