use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bindery::prelude::*;

pub trait IService: Send + Sync {
    fn get_data(&self) -> String;
}

#[derive(Default)]
pub struct ServiceImpl;

impl IService for ServiceImpl {
    fn get_data(&self) -> String {
        "data".to_string()
    }
}

#[derive(Default)]
pub struct TransientService;

impl IService for TransientService {
    fn get_data(&self) -> String {
        "transient data".to_string()
    }
}

bindery::implements!(ServiceImpl => dyn IService);
bindery::implements!(TransientService => dyn IService);
bindery::catalog!(ServiceImpl => dyn IService);
bindery::catalog!(TransientService => dyn IService);

pub trait RequestState: Send + Sync {
    fn serial(&self) -> usize;
}

pub struct Counter(usize);

impl RequestState for Counter {
    fn serial(&self) -> usize {
        self.0
    }
}

bindery::implements!(Counter => dyn RequestState);

static CREATED: AtomicUsize = AtomicUsize::new(0);

fn counter() -> Implementation<dyn RequestState> {
    Implementation::with_constructor(|_: &Args| Ok(Counter(CREATED.fetch_add(1, Ordering::SeqCst))))
}

fn container() -> Container {
    let _ = bindery::logging::try_init_for_tests("bindery_container=debug");
    Container::with_settings(Settings::default())
}

#[test]
fn singleton_then_transient_override() {
    let mut container = container();
    let cx = Context::new();

    container
        .register(Implementation::<dyn IService>::of::<ServiceImpl>(), Lifecycle::Singleton, false)
        .unwrap();
    assert_eq!(container.get::<dyn IService>(&cx).unwrap().get_data(), "data");

    container
        .register(
            Implementation::<dyn IService>::of::<TransientService>(),
            Lifecycle::Transient,
            true,
        )
        .unwrap();

    let a = container.get_at::<dyn IService>(&cx, 1).unwrap();
    let b = container.get_at::<dyn IService>(&cx, 1).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.get_data(), "transient data");
    assert_eq!(b.get_data(), "transient data");

    let first = container.get::<dyn IService>(&cx).unwrap();
    let again = container.get::<dyn IService>(&cx).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
}

#[test]
fn second_registration_without_override_fails() {
    let mut container = container();
    container
        .register(Implementation::<dyn IService>::of::<ServiceImpl>(), Lifecycle::Singleton, false)
        .unwrap();

    let err = container
        .register(Implementation::<dyn IService>::of::<TransientService>(), Lifecycle::Singleton, false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);
    assert_eq!(container.binding_count::<dyn IService>(), 1);
}

#[test]
fn scoped_lifecycle_follows_scope() {
    let mut container = container();
    container.register(counter(), Lifecycle::Scoped, false).unwrap();
    let cx = Context::new();

    assert_eq!(
        container.get::<dyn RequestState>(&cx).map(|s| s.serial()).unwrap_err().kind(),
        ErrorKind::Scope
    );

    container.start_scope(&cx);
    let a = container.get::<dyn RequestState>(&cx).unwrap();
    let b = container.get::<dyn RequestState>(&cx).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    container.end_scope(&cx);

    assert_eq!(
        container.get::<dyn RequestState>(&cx).map(|s| s.serial()).unwrap_err().kind(),
        ErrorKind::Scope
    );
}

#[test]
fn concurrent_contexts_are_isolated() {
    let mut container = container();
    container.register(counter(), Lifecycle::Scoped, false).unwrap();
    let container = Arc::new(container);
    let barrier = Arc::new(std::sync::Barrier::new(2));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let container = Arc::clone(&container);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let cx = Context::new();
                container.start_scope(&cx);
                let mine = container.get::<dyn RequestState>(&cx).unwrap();
                // Both scopes are open at this point.
                barrier.wait();
                let again = container.get::<dyn RequestState>(&cx).unwrap();
                assert!(Arc::ptr_eq(&mine, &again));
                container.end_scope(&cx);
                mine.serial()
            })
        })
        .collect();

    let serials: Vec<usize> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_ne!(serials[0], serials[1]);
}

#[test]
fn register_by_name_from_catalog() {
    let mut container = container();
    container.set_root_namespace(module_path!()).unwrap();

    container
        .register_named::<dyn IService>("TransientService", Lifecycle::Transient, false)
        .unwrap();

    let cx = Context::new();
    let service = container.get::<dyn IService>(&cx).unwrap();
    assert_eq!(service.get_data(), "transient data");
    assert!(container.describe().contains("[0] Transient  TransientService"));
}

#[test]
fn register_by_unknown_name() {
    let mut container = container();
    container.set_root_namespace(module_path!()).unwrap();

    let err = container
        .register_named::<dyn IService>("MissingService", Lifecycle::Singleton, false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("MissingService"));
    assert!(!container.contains::<dyn IService>());
}

#[test]
fn unregistered_contract_is_configuration_error() {
    let container = container();
    let err = container
        .get::<dyn RequestState>(&Context::new())
        .map(|s| s.serial())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[cfg(feature = "async")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn task_contexts_keep_their_scope_across_awaits() {
    let mut container = container();
    container.register(counter(), Lifecycle::Scoped, false).unwrap();
    let container = Arc::new(container);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let container = Arc::clone(&container);
            tokio::spawn(Context::new().scope(async move {
                let cx = Context::current();
                let _guard = container.enter_scope(&cx);
                let before = container.get::<dyn RequestState>(&cx).unwrap();
                tokio::task::yield_now().await;
                let after = container.get::<dyn RequestState>(&Context::current()).unwrap();
                assert!(Arc::ptr_eq(&before, &after));
                before.serial()
            }))
        })
        .collect();

    let mut serials = Vec::new();
    for task in tasks {
        serials.push(task.await.unwrap());
    }
    serials.sort_unstable();
    serials.dedup();
    assert_eq!(serials.len(), 4);
}
