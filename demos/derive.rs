//! Example demonstrating the #[derive(Autowire)] macro
//!
//! Run with:
//!   cargo run --example derive --features derive

use keyed_injector::{Autowire, Concrete, Container};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// Dependencies
#[derive(Autowire)]
struct Database {
    #[autowire(default = String::from("postgres://localhost:5432/myapp"))]
    url: String,
}

#[derive(Autowire)]
struct Cache {
    #[autowire(default = 1024)]
    size: usize,
}

#[derive(Autowire)]
struct Logger;

// Service with autowired dependencies
#[derive(Autowire)]
#[autowire(name = "users")]
struct UserService {
    db: Arc<Database>,
    cache: Arc<Cache>,
    logger: Option<Arc<Logger>>,
    #[autowire(class = "app.name")]
    app: Arc<String>,
    // Not a constructor parameter; uses Default
    #[autowire(skip)]
    request_count: AtomicU64,
}

impl UserService {
    fn describe(&self) -> String {
        let logger_status = if self.logger.is_some() {
            "with logging"
        } else {
            "without logging"
        };
        format!(
            "{} UserService connected to {} with cache size {} ({}, requests: {})",
            self.app,
            self.db.url,
            self.cache.size,
            logger_status,
            self.request_count.fetch_add(1, Ordering::Relaxed)
        )
    }
}

fn main() {
    println!("=== Keyed Injector Derive Macro Demo ===\n");

    let container = Container::builder().with_autowiring().build();
    container.register_type::<Database>();
    container.register_type::<Cache>();
    container.register_type::<UserService>();
    container.add_concrete("app.name", Concrete::literal(String::from("shop")));
    // Logger is NOT registered, so the nullable field is None

    println!("Autowiring UserService...");
    let users = container
        .resolve_as::<UserService>("users")
        .expect("Failed to autowire UserService");
    println!("  {}", users.describe());
    println!();

    container.register_type::<Logger>();

    println!("Autowiring UserService with Logger...");
    let users = container
        .resolve_as::<UserService>("users")
        .expect("Failed to autowire UserService");
    println!("  {}", users.describe());
    println!();

    println!("=== Demo Complete ===");
    println!("\nThe #[derive(Autowire)] macro generated a class descriptor that:");
    println!("  - Resolves Arc<T> fields through the container or by autowiring");
    println!("  - Passes null to Option<Arc<T>> fields nobody provides");
    println!("  - Uses #[autowire(default = ...)] for plain fields");
    println!("  - Uses Default::default() for #[autowire(skip)] fields");
}
