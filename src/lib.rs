//! # Keyed Injector - String-Keyed Dependency Injection for Rust
//!
//! A dependency injection container where services are registered and looked
//! up by string identifiers.
//!
//! ## Features
//!
//! - 🔑 **Keyed definitions** - Shared or transient recipes with constructor arguments and method calls
//! - 💤 **Lazy providers** - Batches of definitions registered on first demand, exactly once
//! - 🔗 **Delegate chain** - Ordered fallback sources such as parameters and autowiring
//! - 🧩 **Autowiring** - Constructor dependencies resolved from a class table or `#[derive(Autowire)]`
//! - ✍️ **Signatures** - Expose a delegate or provider (or its operations) under a name
//! - 🔄 **Cycle detection** - Re-entrant resolutions fail fast instead of overflowing the stack
//! - 📊 **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use keyed_injector::{Class, Container};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: Arc<String>,
//! }
//!
//! let container = Container::new();
//! container.register_class(
//!     Class::named::<Database>("Database")
//!         .constructor(|args| Ok(Database { url: args.get::<String>(0)? }))
//!         .build(),
//! );
//!
//! container.add_shared("Database").add_argument("db.url");
//! container.add_concrete("db.url", keyed_injector::Concrete::literal(String::from("postgres://localhost")));
//!
//! let db = container.resolve_as::<Database>("Database").unwrap();
//! assert_eq!(*db.url, "postgres://localhost");
//! assert!(Arc::ptr_eq(&db, &container.resolve_as::<Database>("Database").unwrap()));
//! ```
//!
//! ## Lookup Order
//!
//! 1. Definitions added with `add*`
//! 2. Providers claiming the identifier (their `register` runs once, on demand)
//! 3. Delegates, in the order they were added
//!
//! A provider that claims an identifier but registers nothing under it is a
//! [`DiError::ProviderLied`] error, not a miss.
//!
//! ## Autowiring
//!
//! ```rust
//! use keyed_injector::{Class, Container, Param};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Mailer;
//!
//! struct Newsletter {
//!     mailer: Arc<Mailer>,
//!     batch: usize,
//! }
//!
//! let container = Container::builder().with_autowiring().build();
//! container.register_class(Class::named::<Mailer>("Mailer").default_constructor().build());
//! container.register_class(
//!     Class::named::<Newsletter>("Newsletter")
//!         .param(Param::class_named("mailer", "Mailer"))
//!         .param(Param::builtin("batch", "usize").with_default(100usize))
//!         .constructor(|args| {
//!             Ok(Newsletter {
//!                 mailer: args.get::<Mailer>(0)?,
//!                 batch: args.value::<usize>(1)?,
//!             })
//!         })
//!         .build(),
//! );
//!
//! let newsletter = container.resolve_as::<Newsletter>("Newsletter").unwrap();
//! assert_eq!(newsletter.batch, 100);
//! ```

// `#[derive(Autowire)]` expands to `::keyed_injector` paths
extern crate self as keyed_injector;

mod autowire;
mod class;
mod container;
mod definition;
mod delegate;
mod error;
#[cfg(feature = "logging")]
pub mod logging;
mod parameter;
mod provider;
mod signature;
mod storage;

pub use autowire::*;
pub use class::*;
pub use container::*;
pub use definition::*;
pub use delegate::*;
pub use error::*;
pub use parameter::*;
pub use provider::*;
pub use signature::*;
pub use storage::*;

#[cfg(feature = "derive")]
pub use keyed_injector_derive::Autowire;

/// A resolved, type-erased service
pub type Instance = std::sync::Arc<dyn std::any::Any + Send + Sync>;

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Arg, Args, Autowire, Class, Concrete, Container, Delegate, DiError, Instance, Param,
        ParameterResolver, Provider, Result,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct FooBar;

    struct Bar {
        foo_bar: Arc<FooBar>,
    }

    struct Foo {
        bar: Arc<Bar>,
    }

    fn register_classes(container: &Container) {
        container.register_class(Class::named::<FooBar>("FooBar").default_constructor().build());
        container.register_class(
            Class::named::<Bar>("Bar")
                .param(Param::class_named("foo_bar", "FooBar"))
                .constructor(|args| {
                    Ok(Bar {
                        foo_bar: args.get::<FooBar>(0)?,
                    })
                })
                .build(),
        );
        container.register_class(
            Class::named::<Foo>("Foo")
                .param(Param::class_named("bar", "Bar"))
                .constructor(|args| {
                    Ok(Foo {
                        bar: args.get::<Bar>(0)?,
                    })
                })
                .build(),
        );
    }

    struct ToolsProvider {
        runs: AtomicU32,
    }

    impl Provider for ToolsProvider {
        fn provides(&self, id: &str) -> bool {
            matches!(id, "Foo" | "Bar" | "FooBar")
        }

        fn register(&self, container: &Container) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            container.add("Foo").add_argument("Bar");
            container.add("Bar").add_argument("FooBar");
            container.add_shared("FooBar");
            Ok(())
        }

        fn call(&self, method: &str, _: &Args) -> Result<Option<Instance>> {
            match method {
                "inject_it" => Ok(Some(Arc::new("injected"))),
                _ => Err(DiError::method_not_found("ToolsProvider", method)),
            }
        }
    }

    #[test]
    fn test_recursive_definitions() {
        let container = Container::new();
        register_classes(&container);
        container.add("Foo").add_argument("Bar");
        container.add("Bar").add_argument("FooBar");
        container.add("FooBar");

        let foo = container.resolve_as::<Foo>("Foo").unwrap();
        let again = container.resolve_as::<Foo>("Foo").unwrap();

        assert!(!Arc::ptr_eq(&foo, &again));
        assert!(!Arc::ptr_eq(&foo.bar.foo_bar, &again.bar.foo_bar));
    }

    #[test]
    fn test_shared_definition_identity() {
        let container = Container::new();
        register_classes(&container);
        container.add_shared("Foo").add_argument("Bar");
        container.add("Bar").add_argument("FooBar");
        container.add("FooBar");

        let a = container.resolve_as::<Foo>("Foo").unwrap();
        let b = container.resolve_as::<Foo>("Foo").unwrap();
        let forced = container.resolve_new_as::<Foo>("Foo").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &forced));
        assert!(Arc::ptr_eq(&a, &container.resolve_as::<Foo>("Foo").unwrap()));
    }

    #[test]
    fn test_closure_definition() {
        let container = Container::new();
        container.add_concrete(
            "greeting",
            Concrete::factory(|container, _| {
                let name = container.resolve_as::<String>("name")?;
                Ok(format!("hello {name}"))
            }),
        );
        container.add_concrete("name", Concrete::literal(String::from("world")));

        assert_eq!(*container.resolve_as::<String>("greeting").unwrap(), "hello world");
    }

    #[test]
    fn test_provider_registers_lazily_once() {
        let container = Container::new();
        register_classes(&container);
        let provider = Arc::new(ToolsProvider {
            runs: AtomicU32::new(0),
        });
        container.add_provider_arc(provider.clone(), false);

        assert!(container.has("Foo"));
        assert_eq!(provider.runs.load(Ordering::SeqCst), 0);

        let foo = container.resolve_as::<Foo>("Foo").unwrap();
        let other = container.resolve_as::<Foo>("Foo").unwrap();
        container.resolve("Bar").unwrap();

        // FooBar is shared by the provider
        assert!(Arc::ptr_eq(&foo.bar.foo_bar, &other.bar.foo_bar));
        assert_eq!(provider.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_autowire_fallback() {
        let container = Container::builder().with_autowiring().build();
        register_classes(&container);

        assert!(container.has("Foo"));
        let foo = container.resolve_as::<Foo>("Foo").unwrap();
        let _foo_bar: &FooBar = &foo.bar.foo_bar;

        assert!(container.resolve("Unknown").unwrap_err().is_not_found());
    }

    #[test]
    fn test_parameter_delegate_feeds_arguments() {
        let parameters = ParameterResolver::new();
        parameters.add_parameter("app.name", String::from("shop"));

        let container = Container::builder().with_parameters(parameters).build();
        container
            .add_concrete(
                "title",
                Concrete::factory(|_, args| Ok(args.get::<String>(0)?.to_uppercase())),
            )
            .add_argument("app.name");

        assert_eq!(*container.resolve_as::<String>("title").unwrap(), "SHOP");

        // delegate values are never definitions
        assert!(matches!(container.modify("app.name"), Err(DiError::NotModifiable { .. })));
    }

    #[test]
    fn test_modify_to_shared() {
        let container = Container::new();
        register_classes(&container);
        container.add("FooBar");

        let a = container.resolve("FooBar").unwrap();
        container.modify("FooBar").unwrap().set_shared(true);
        let b = container.resolve("FooBar").unwrap();
        let c = container.resolve("FooBar").unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[test]
    fn test_inject_delegate_instance_and_method() {
        let container = Container::new();
        let signature = container.add_delegate(ParameterResolver::new(), true).unwrap();

        container.inject_instance(&signature, "parameters").unwrap();
        container.inject_method(&signature, "add_parameter").unwrap();

        let target = container.invoke("parameters", Vec::new()).unwrap().target().unwrap();
        assert!(target.downcast_ref::<ParameterResolver>().is_some());

        container
            .invoke(
                "add_parameter",
                vec![Arc::new("version") as Instance, Arc::new(3u32) as Instance],
            )
            .unwrap();
        assert_eq!(*container.resolve_as::<u32>("version").unwrap(), 3);

        let resolver = target.downcast_ref::<ParameterResolver>().unwrap();
        assert!(resolver.has("version"));
    }

    #[test]
    fn test_inject_provider_instance_and_method() {
        let container = Container::new();
        let signature = container
            .add_provider(
                ToolsProvider {
                    runs: AtomicU32::new(0),
                },
                true,
            )
            .unwrap();

        container.inject_instance(&signature, "tools").unwrap();
        container.inject_method(&signature, "inject_it").unwrap();

        let tools = container.invoke("tools", Vec::new()).unwrap().target().unwrap();
        assert!(tools.as_provider().is_some());

        let result = container.invoke("inject_it", Vec::new()).unwrap();
        assert_eq!(*result.value_as::<&str>().unwrap(), "injected");
    }

    #[test]
    fn test_error_kinds() {
        let container = Container::new();
        assert_eq!(
            container.resolve("missing").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            container.invoke("missing", Vec::new()).unwrap_err().kind(),
            ErrorKind::Container
        );

        container.add_concrete("bad", Concrete::literal(0u8)).add_argument("");
        // literals ignore arguments
        assert!(container.resolve("bad").is_ok());

        container.add_concrete("worse", Concrete::factory(|_, _| Ok(0u8))).add_argument("");
        assert_eq!(
            container.resolve("worse").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
