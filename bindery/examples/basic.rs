//! Basic example of the Bindery container.

use bindery::prelude::*;
use std::sync::Arc;

// === Define your contracts and implementations ===

pub trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

#[derive(Default)]
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

bindery::implements!(ConsoleLogger => dyn Logger);

pub trait Database: Send + Sync {
    fn query(&self, sql: &str) -> String;
}

pub struct Postgres {
    url: String,
}

impl Database for Postgres {
    fn query(&self, sql: &str) -> String {
        format!("{sql} -> results from {}", self.url)
    }
}

bindery::implements!(Postgres => dyn Database);

pub trait RequestLog: Send + Sync {
    fn id(&self) -> u64;
}

pub struct InMemoryRequestLog {
    id: u64,
}

impl RequestLog for InMemoryRequestLog {
    fn id(&self) -> u64 {
        self.id
    }
}

bindery::implements!(InMemoryRequestLog => dyn RequestLog);

// Catalogued so it can be registered by name.
bindery::catalog!(ConsoleLogger => dyn Logger);

fn main() -> bindery::Result<()> {
    bindery::logging::init("bindery_container=debug");

    let mut container = Container::builder()
        .settings(Settings::load())
        // Logger: registered by name through discovery
        .register_named::<dyn Logger>("ConsoleLogger", Lifecycle::Singleton)
        // Database: constructed from the first caller's arguments
        .register(
            Implementation::<dyn Database>::with_constructor(|args: &Args| {
                Ok(Postgres {
                    url: args.get_named::<String>("url")?.clone(),
                })
            }),
            Lifecycle::Singleton,
        )
        .build()?;

    // Request log: one per scope
    container.register(
        Implementation::<dyn RequestLog>::with_constructor(|args: &Args| {
            Ok(InMemoryRequestLog {
                id: *args.get::<u64>(0)?,
            })
        }),
        Lifecycle::Scoped,
        false,
    )?;

    tracing::info!(contracts = container.len(), "Container ready");
    print!("{}", container.describe());

    let container = Arc::new(container);
    let cx = Context::new();

    let db = container.get_with::<dyn Database>(
        &cx,
        0,
        &Args::new().named("url", "postgres://localhost/app".to_string()),
    )?;

    for request in 1..=2u64 {
        container.with_scope(&cx, |c| -> bindery::Result<()> {
            let log = c.get_with::<dyn RequestLog>(&cx, 0, &Args::new().arg(request))?;
            let again = c.get::<dyn RequestLog>(&cx)?;
            assert!(Arc::ptr_eq(&log, &again));

            c.invoke(&cx, &Indices::new(), |logger: Arc<dyn Logger>| {
                logger.log(&format!("request {}: {}", log.id(), db.query("SELECT 1")));
            })
        })?;
    }

    Ok(())
}
