//! Example demonstrating logging capabilities
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-pretty,logging-json
//! ```

use keyed_injector::{Concrete, Container, ParameterResolver, Provider, Result};

struct MailProvider;

impl Provider for MailProvider {
    fn provides(&self, id: &str) -> bool {
        id.starts_with("mail.")
    }

    fn register(&self, container: &Container) -> Result<()> {
        container.add_shared_concrete("mail.transport", Concrete::literal("smtp"));
        Ok(())
    }
}

fn main() {
    // Resolution steps are logged at TRACE
    let logging = keyed_injector::logging::builder().trace().di_only();
    if cfg!(feature = "logging-json") {
        logging.json().init();
    } else {
        logging.pretty().init();
    }

    println!("=== Keyed Injector Logging Demo ===\n");

    let parameters = ParameterResolver::new();
    parameters.add_parameter("app.name", String::from("demo"));

    // logs: "Creating new DI container", "Adding delegate"
    let container = Container::builder().with_parameters(parameters).build();

    // logs: "Adding service definition"
    container
        .add_shared_concrete(
            "greeting",
            Concrete::factory(|_, args| Ok(format!("hello from {}", args.get::<String>(0)?))),
        )
        .add_argument("app.name");

    // logs: "Adding service provider"
    container.add_provider(MailProvider, false);

    // logs: "Resolving service", "Service supplied by delegate", "Caching shared instance"
    let greeting = container.resolve_as::<String>("greeting").unwrap();
    println!("  [App] {greeting}");

    // logs: "Service claimed by a provider", "Registering service provider on first demand"
    let transport = container.resolve_as::<&str>("mail.transport").unwrap();
    println!("  [App] mail transport: {transport}");

    // logs: "Service not found"
    assert!(container.resolve("missing").is_err());

    // logs: "Circular dependency detected"
    container.add_concrete("a", Concrete::factory(|_, _| Ok(()))).add_argument("b");
    container.add_concrete("b", Concrete::factory(|_, _| Ok(()))).add_argument("a");
    if let Err(err) = container.resolve("a") {
        println!("  [App] {err}");
    }

    println!("\n=== Demo Complete ===");
    println!("Tip: add --features logging-json for JSON output");
}
