//! Service providers
//!
//! A [`Provider`] lazily registers a batch of definitions the first time any
//! identifier it claims is looked up. The [`ProviderAggregate`] keeps providers
//! in insertion order and guarantees each provider's `register` runs at most
//! once per container.

use crate::class::Args;
use crate::{Container, DiError, Instance, Result};
use ahash::RandomState;
use dashmap::DashSet;
use std::any::Any;
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "logging")]
use tracing::debug;

/// Type-erased access to the concrete type behind a trait object.
///
/// Implemented automatically for every `Send + Sync + 'static` type; it lets
/// [`Provider`] and [`Delegate`](crate::Delegate) objects be downcast.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Name of the concrete type
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A unit that registers definitions on demand.
///
/// # Examples
///
/// ```rust
/// use keyed_injector::{Concrete, Container, Provider, Result};
///
/// struct DatabaseProvider;
///
/// impl Provider for DatabaseProvider {
///     fn provides(&self, id: &str) -> bool {
///         id == "db.url"
///     }
///
///     fn register(&self, container: &Container) -> Result<()> {
///         container.add_shared_concrete("db.url", Concrete::literal(String::from("postgres://")));
///         Ok(())
///     }
/// }
///
/// let container = Container::new();
/// container.add_provider(DatabaseProvider, false);
///
/// assert!(container.has("db.url"));
/// let url = container.resolve_as::<String>("db.url").unwrap();
/// assert_eq!(*url, "postgres://");
/// ```
pub trait Provider: AsAny {
    /// Stable identity used for de-duplication. Defaults to the type name.
    fn identifier(&self) -> String {
        self.type_name().to_owned()
    }

    /// Whether this provider registers a definition for `id`
    fn provides(&self, id: &str) -> bool;

    /// Add every claimed definition to `container`
    fn register(&self, container: &Container) -> Result<()>;

    /// Named operation exposed through [`Container::invoke`]
    fn call(&self, method: &str, args: &Args) -> Result<Option<Instance>> {
        let _ = args;
        Err(DiError::method_not_found(self.identifier(), method))
    }
}

/// Ordered, append-only collection of providers.
pub struct ProviderAggregate {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    registered: DashSet<String, RandomState>,
}

impl ProviderAggregate {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            registered: DashSet::with_hasher(RandomState::new()),
        }
    }

    /// Append a provider and return its position.
    ///
    /// A provider whose identifier is already present is not added; the
    /// position of the present one is returned instead.
    pub fn add(&self, provider: Arc<dyn Provider>) -> usize {
        let identifier = provider.identifier();
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(index) = providers
            .iter()
            .position(|p| p.identifier() == identifier)
        {
            #[cfg(feature = "logging")]
            debug!(
                target: "keyed_injector",
                provider = %identifier,
                index,
                "Provider already present, skipping"
            );
            return index;
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            provider = %identifier,
            index = providers.len(),
            "Adding service provider"
        );

        providers.push(provider);
        providers.len() - 1
    }

    /// Whether any provider claims `id`
    pub fn can_provide(&self, id: &str) -> bool {
        self.snapshot().iter().any(|p| p.provides(id))
    }

    /// Run `register` on every not yet registered provider claiming `id`.
    ///
    /// Providers are marked before they run, so a registration that looks up
    /// one of its own identifiers does not run the provider again.
    pub fn register(&self, container: &Container, id: &str) -> Result<()> {
        let claimants: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|p| p.provides(id))
            .collect();

        if claimants.is_empty() {
            return Err(DiError::NotProvided { id: id.to_owned() });
        }

        for provider in claimants {
            let identifier = provider.identifier();
            if !self.registered.insert(identifier) {
                continue;
            }

            #[cfg(feature = "logging")]
            debug!(
                target: "keyed_injector",
                provider = %provider.identifier(),
                service = id,
                "Registering service provider on first demand"
            );

            provider.register(container)?;
        }
        Ok(())
    }

    /// Whether the provider with `identifier` has run its registration
    #[inline]
    pub fn is_registered(&self, identifier: &str) -> bool {
        self.registered.contains(identifier)
    }

    /// Provider at `index` in insertion order
    pub fn nth(&self, index: usize) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Providers in insertion order
    pub fn snapshot(&self) -> Vec<Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for ProviderAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAggregate")
            .field("count", &self.len())
            .field("registered", &self.registered.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Concrete;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        runs: AtomicU32,
    }

    impl Provider for CountingProvider {
        fn provides(&self, id: &str) -> bool {
            matches!(id, "a" | "b")
        }

        fn register(&self, container: &Container) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            container.add_concrete("a", Concrete::literal(1u8));
            container.add_concrete("b", Concrete::literal(2u8));
            Ok(())
        }
    }

    struct Named(&'static str);

    impl Provider for Named {
        fn identifier(&self) -> String {
            self.0.to_owned()
        }

        fn provides(&self, _: &str) -> bool {
            false
        }

        fn register(&self, _: &Container) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_runs_once() {
        let container = Container::new();
        let aggregate = ProviderAggregate::new();
        let provider = Arc::new(CountingProvider {
            runs: AtomicU32::new(0),
        });
        aggregate.add(provider.clone());

        aggregate.register(&container, "a").unwrap();
        aggregate.register(&container, "b").unwrap();
        aggregate.register(&container, "a").unwrap();

        assert_eq!(provider.runs.load(Ordering::SeqCst), 1);
        assert!(aggregate.is_registered(&provider.identifier()));
    }

    /// Claims `shared.id` under its own identifier
    struct Claimant {
        name: &'static str,
        runs: Arc<AtomicU32>,
    }

    impl Provider for Claimant {
        fn identifier(&self) -> String {
            self.name.to_owned()
        }

        fn provides(&self, id: &str) -> bool {
            id == "shared.id"
        }

        fn register(&self, container: &Container) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if !container.definitions().has("shared.id") {
                container.add_concrete("shared.id", Concrete::literal(self.name));
            }
            Ok(())
        }
    }

    #[test]
    fn test_register_runs_every_claimant() {
        let container = Container::new();
        let runs = Arc::new(AtomicU32::new(0));
        for name in ["one", "two"] {
            let runs = runs.clone();
            container.add_provider(Claimant { name, runs }, false);
        }

        let value = container.resolve_as::<&str>("shared.id").unwrap();

        assert_eq!(*value, "one");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(container.providers().is_registered("one"));
        assert!(container.providers().is_registered("two"));
    }

    #[test]
    fn test_provides_may_add_providers() {
        struct Spawning(Container);

        impl Provider for Spawning {
            fn provides(&self, _: &str) -> bool {
                self.0.add_provider(Named("spawned"), false);
                false
            }

            fn register(&self, _: &Container) -> Result<()> {
                Ok(())
            }
        }

        let container = Container::new();
        container.add_provider(Spawning(container.clone()), false);

        assert!(!container.has("anything"));
        assert_eq!(container.providers().len(), 2);
    }

    #[test]
    fn test_register_unclaimed() {
        let container = Container::new();
        let aggregate = ProviderAggregate::new();
        aggregate.add(Arc::new(Named("only")));

        let err = aggregate.register(&container, "x").unwrap_err();
        assert!(matches!(err, DiError::NotProvided { .. }));
        assert!(err.is_container_error());
    }

    #[test]
    fn test_dedup_by_identifier() {
        let aggregate = ProviderAggregate::new();
        assert_eq!(aggregate.add(Arc::new(Named("first"))), 0);
        assert_eq!(aggregate.add(Arc::new(Named("second"))), 1);
        assert_eq!(aggregate.add(Arc::new(Named("first"))), 0);
        assert_eq!(aggregate.len(), 2);
    }

    #[test]
    fn test_default_identifier_is_type_name() {
        let provider = CountingProvider {
            runs: AtomicU32::new(0),
        };
        assert!(provider.identifier().ends_with("CountingProvider"));

        let erased: Arc<dyn Provider> = Arc::new(provider);
        assert!((*erased).as_any().is::<CountingProvider>());
    }
}
