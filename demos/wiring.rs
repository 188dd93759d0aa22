//! Wiring an application graph, with logging
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example wiring --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example wiring --features logging-pretty
//! ```

use graph_injector::{Container, Context, DiError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[allow(dead_code)]
struct Config {
    database_url: String,
}

#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserRepository {
    db: Arc<Database>,
}

#[allow(dead_code)]
struct UserService {
    repo: Arc<UserRepository>,
}

struct Mailer;

fn main() {
    graph_injector::logging::init();

    println!("=== graph-injector wiring demo ===\n");

    // Logs: "Creating new DI container"
    let container = Container::builder()
        .resolution_timeout(Duration::from_millis(500))
        .context(Context::new("demo"))
        .build();

    // Logs: "Registering eager singleton"
    container.register(Config {
        database_url: "postgres://localhost/app".into(),
    });

    // Logs: "Registering lazy singleton"
    container.register_factory(|r| {
        println!("  [App] connecting to database...");
        Database {
            url: r.require::<Config>().database_url.clone(),
        }
    });
    container.register_factory(|r| UserRepository {
        db: r.require::<Database>(),
    });
    // Fallible factories propagate dependency errors with `?`
    container.register_try_factory(|r| {
        Ok(UserService {
            repo: r.get::<UserRepository>()?,
        })
    });

    // Logs: "Constructing component" for each link of the chain
    let users = container.get::<UserService>().expect("user service");
    let again = container.get::<UserService>().expect("user service");
    println!("same instance: {}", Arc::ptr_eq(&users, &again));

    // A factory that never finishes: logs the diagnostics snapshot on timeout
    container.register_factory(|r| {
        while !r.is_cancelled() {
            thread::sleep(Duration::from_millis(10));
        }
        Mailer
    });
    match container.get::<Mailer>() {
        Err(e @ DiError::ResolutionTimeout { .. }) => println!("mailer: {e}"),
        other => println!("mailer: unexpected {:?}", other.map(|_| ())),
    }

    println!("\n{}", container.diagnostics());
    println!("\n=== Demo Complete ===");
}
