//! String-keyed dependency injection container
//!
//! The `Container` composes the definition storage, the provider aggregate,
//! the delegate chain and the signature tables. Every lookup walks them in
//! that order:
//!
//! 1. a stored [`Definition`]
//! 2. a [`Provider`] claiming the identifier, registered on first demand
//! 3. the first [`Delegate`] whose `has` answers true
//!
//! and fails with [`DiError::NotFound`] when all of them miss.

use crate::autowire::AutowireResolver;
use crate::class::{Args, Autowire, Class, ClassRegistry};
use crate::definition::{Concrete, Definition};
use crate::delegate::Delegate;
use crate::parameter::ParameterResolver;
use crate::provider::{Provider, ProviderAggregate};
use crate::signature::{InjectionKind, Invoked, Signature, SignatureTable, SourceKind, Target};
use crate::storage::DefinitionAggregate;
use crate::{DiError, Instance, Result};
use std::any::Any;
use std::cell::RefCell;
use std::sync::{Arc, PoisonError, RwLock, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Resolution Stack (cycle detection)
// =============================================================================

thread_local! {
    /// Identifiers currently being resolved on this thread, tagged with the
    /// address of the container resolving them
    static RESOLVING: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Pops the resolution stack when dropped
pub(crate) struct ResolutionGuard {
    active: bool,
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        if self.active {
            RESOLVING.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}

// =============================================================================
// Container
// =============================================================================

struct Inner {
    definitions: DefinitionAggregate,
    providers: ProviderAggregate,
    delegates: RwLock<Vec<Arc<dyn Delegate>>>,
    signatures: SignatureTable,
    classes: ClassRegistry,
    detect_cycles: bool,
}

/// What a lookup found
#[derive(Debug, Clone)]
pub enum Entry {
    /// A stored definition, not yet built
    Definition(Arc<Definition>),
    /// A value supplied by a delegate, returned as-is
    Value(Instance),
}

impl Entry {
    #[inline]
    pub fn is_definition(&self) -> bool {
        matches!(self, Entry::Definition(_))
    }

    pub fn into_definition(self) -> Option<Arc<Definition>> {
        match self {
            Entry::Definition(definition) => Some(definition),
            Entry::Value(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Instance> {
        match self {
            Entry::Value(value) => Some(value),
            Entry::Definition(_) => None,
        }
    }
}

/// Dependency injection container keyed by string identifiers.
///
/// Cloning is cheap and yields a handle to the same container.
///
/// # Examples
///
/// ```rust
/// use keyed_injector::{Concrete, Container};
/// use std::sync::Arc;
///
/// struct Repository {
///     dsn: Arc<String>,
/// }
///
/// let container = Container::new();
/// container.add_concrete("dsn", Concrete::literal(String::from("sqlite::memory:")));
/// container
///     .add_shared_concrete(
///         "repository",
///         Concrete::factory(|_, args| Ok(Repository { dsn: args.get::<String>(0)? })),
///     )
///     .add_argument("dsn");
///
/// let a = container.resolve_as::<Repository>("repository").unwrap();
/// let b = container.resolve_as::<Repository>("repository").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(*a.dsn, "sqlite::memory:");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

/// Non-owning handle to a [`Container`]
#[derive(Clone)]
pub struct WeakContainer(Weak<Inner>);

impl WeakContainer {
    /// The container, if it is still alive
    #[inline]
    pub fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|inner| Container { inner })
    }
}

impl std::fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakContainer")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

impl Container {
    /// Create an empty container with cycle detection enabled.
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a container pre-sized for `capacity` definitions.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::builder().capacity(capacity).build()
    }

    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Add a definition whose concrete is the identifier itself.
    ///
    /// Replaces any previous definition under `id`.
    #[inline]
    pub fn add(&self, id: impl Into<String>) -> Arc<Definition> {
        let id = id.into();
        let concrete = Concrete::Class(id.clone());
        self.add_concrete(id, concrete)
    }

    pub fn add_concrete(&self, id: impl Into<String>, concrete: Concrete) -> Arc<Definition> {
        self.add_definition(id.into(), concrete, false)
    }

    #[inline]
    pub fn add_shared(&self, id: impl Into<String>) -> Arc<Definition> {
        let id = id.into();
        let concrete = Concrete::Class(id.clone());
        self.add_shared_concrete(id, concrete)
    }

    pub fn add_shared_concrete(
        &self,
        id: impl Into<String>,
        concrete: Concrete,
    ) -> Arc<Definition> {
        self.add_definition(id.into(), concrete, true)
    }

    /// Add a definition for `T` under its type name
    #[inline]
    pub fn add_type<T: ?Sized + 'static>(&self) -> Arc<Definition> {
        self.add(std::any::type_name::<T>())
    }

    fn add_definition(&self, id: String, concrete: Concrete, shared: bool) -> Arc<Definition> {
        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            service = %id,
            concrete = ?concrete,
            shared,
            service_count = self.inner.definitions.len() + 1,
            "Adding service definition"
        );

        self.inner.definitions.add(id, concrete, shared)
    }

    /// Add a provider, optionally signing it for [`inject`](Self::inject).
    pub fn add_provider<P: Provider>(&self, provider: P, sign: bool) -> Option<Signature> {
        self.add_provider_arc(Arc::new(provider), sign)
    }

    pub fn add_provider_arc(&self, provider: Arc<dyn Provider>, sign: bool) -> Option<Signature> {
        let identifier = provider.identifier();
        let index = self.inner.providers.add(provider);

        sign.then(|| {
            self.inner
                .signatures
                .sign(SourceKind::Provider, &identifier, index)
        })
    }

    /// Append a delegate to the fallback chain.
    ///
    /// An unsigned, container-aware delegate is attached to this container.
    /// A signed delegate is left unattached and its signature returned.
    pub fn add_delegate<D: Delegate>(&self, delegate: D, sign: bool) -> Option<Signature> {
        self.add_delegate_arc(Arc::new(delegate), sign)
    }

    pub fn add_delegate_arc(&self, delegate: Arc<dyn Delegate>, sign: bool) -> Option<Signature> {
        let type_name = (*delegate).type_name();
        let index = {
            let mut delegates = self
                .inner
                .delegates
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            delegates.push(Arc::clone(&delegate));
            delegates.len() - 1
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            delegate = type_name,
            index,
            sign,
            "Adding delegate"
        );

        if sign {
            return Some(
                self.inner
                    .signatures
                    .sign(SourceKind::Delegate, type_name, index),
            );
        }

        if let Some(aware) = delegate.container_aware() {
            aware.set_container(self);
        }
        None
    }

    /// Describe a constructible type
    pub fn register_class(&self, class: Class) -> Arc<Class> {
        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            class = class.name(),
            instantiable = class.is_instantiable(),
            "Registering class"
        );

        self.inner.classes.insert(class)
    }

    #[inline]
    pub fn register_type<T: Autowire>(&self) -> Arc<Class> {
        self.register_class(T::class())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Whether a definition, a provider or a delegate knows `id`
    pub fn has(&self, id: &str) -> bool {
        self.inner.definitions.has(id)
            || self.inner.providers.can_provide(id)
            || self.delegates().iter().any(|delegate| delegate.has(id))
    }

    /// Look `id` up without building it
    #[inline]
    pub fn get(&self, id: &str) -> Result<Entry> {
        self.lookup(id)
    }

    fn lookup(&self, id: &str) -> Result<Entry> {
        if let Some(definition) = self.inner.definitions.find(id) {
            return Ok(Entry::Definition(definition));
        }

        if self.provide(id)? {
            return self
                .inner
                .definitions
                .find(id)
                .map(Entry::Definition)
                .ok_or_else(|| DiError::ProviderLied { id: id.to_owned() });
        }

        for delegate in self.delegates() {
            if delegate.has(id) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "keyed_injector",
                    service = id,
                    delegate = (*delegate).type_name(),
                    "Service supplied by delegate"
                );

                return delegate.get(id).map(Entry::Value);
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            service = id,
            "Service not found"
        );

        Err(DiError::not_found(id))
    }

    /// Run the providers claiming `id` unless it is already defined.
    ///
    /// Returns whether a provider claimed it.
    fn provide(&self, id: &str) -> Result<bool> {
        if self.inner.definitions.has(id) || !self.inner.providers.can_provide(id) {
            return Ok(false);
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "keyed_injector",
            service = id,
            "Service claimed by a provider"
        );

        self.inner.providers.register(self, id)?;
        Ok(true)
    }

    /// Resolve `id`, reusing a shared instance when there is one
    #[inline]
    pub fn resolve(&self, id: &str) -> Result<Instance> {
        self.resolve_with(id, false)
    }

    /// Resolve `id` into a fresh instance, bypassing any shared cache
    #[inline]
    pub fn resolve_new(&self, id: &str) -> Result<Instance> {
        self.resolve_with(id, true)
    }

    fn resolve_with(&self, id: &str, force_new: bool) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: "keyed_injector",
            service = id,
            force_new,
            "Resolving service"
        );

        // Providers register outside the guard: their `register` may resolve
        // the identifiers it has just added.
        self.provide(id)?;

        let _guard = self.enter(id)?;
        match self.lookup(id)? {
            Entry::Definition(definition) => definition.make(self, force_new),
            Entry::Value(value) => Ok(value),
        }
    }

    /// Resolve `id` and downcast it to `T`
    pub fn resolve_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        Self::downcast(id, self.resolve(id)?)
    }

    pub fn resolve_new_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        Self::downcast(id, self.resolve_new(id)?)
    }

    /// Resolve the service registered under `T`'s type name
    #[inline]
    pub fn resolve_type<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.resolve_as::<T>(std::any::type_name::<T>())
    }

    fn downcast<T: Any + Send + Sync>(id: &str, instance: Instance) -> Result<Arc<T>> {
        instance.downcast::<T>().map_err(|_| DiError::TypeMismatch {
            id: id.to_owned(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// The stored definition for `id`, for further configuration.
    ///
    /// Only explicitly added identifiers can be modified.
    pub fn modify(&self, id: &str) -> Result<Arc<Definition>> {
        self.inner
            .definitions
            .find(id)
            .ok_or_else(|| DiError::NotModifiable { id: id.to_owned() })
    }

    /// Mark `id` as being resolved on this thread
    pub(crate) fn enter(&self, id: &str) -> Result<ResolutionGuard> {
        if !self.inner.detect_cycles {
            return Ok(ResolutionGuard { active: false });
        }

        let key = self.key();
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|(owner, entry)| *owner == key && entry == id) {
                let mut chain: Vec<String> = stack
                    .iter()
                    .filter(|(owner, _)| *owner == key)
                    .map(|(_, entry)| entry.clone())
                    .skip_while(|entry| entry != id)
                    .collect();
                chain.push(id.to_owned());

                #[cfg(feature = "logging")]
                debug!(
                    target: "keyed_injector",
                    service = id,
                    depth = chain.len(),
                    "Circular dependency detected"
                );

                return Err(DiError::CircularDependency { chain });
            }

            stack.push((key, id.to_owned()));
            Ok(ResolutionGuard { active: true })
        })
    }

    // =========================================================================
    // Signatures & Injection
    // =========================================================================

    /// Bind `name` to a signed delegate or provider
    pub fn inject(
        &self,
        signature: &Signature,
        name: impl Into<String>,
        kind: InjectionKind,
    ) -> Result<()> {
        self.inner.signatures.bind(signature, name, kind)
    }

    /// Make `name` return the signed object itself
    #[inline]
    pub fn inject_instance(&self, signature: &Signature, name: impl Into<String>) -> Result<()> {
        self.inject(signature, name, InjectionKind::Instance)
    }

    /// Make `name` forward to the signed object's operation of the same name
    #[inline]
    pub fn inject_method(&self, signature: &Signature, name: impl Into<String>) -> Result<()> {
        self.inject(signature, name, InjectionKind::Method)
    }

    /// Call an injected name.
    ///
    /// Names injected as instances ignore `args` and return the signed
    /// object; names injected as methods forward `args` to it.
    ///
    /// ```rust
    /// use keyed_injector::{Container, Instance, ParameterResolver};
    /// use std::sync::Arc;
    ///
    /// let container = Container::new();
    /// let signature = container.add_delegate(ParameterResolver::new(), true).unwrap();
    /// container.inject_method(&signature, "add_parameter").unwrap();
    ///
    /// container
    ///     .invoke("add_parameter", vec![Arc::new("port") as Instance, Arc::new(80u16) as Instance])
    ///     .unwrap();
    /// assert_eq!(*container.resolve_as::<u16>("port").unwrap(), 80);
    /// ```
    pub fn invoke(&self, name: &str, args: Vec<Instance>) -> Result<Invoked> {
        let (signature, kind) = self
            .inner
            .signatures
            .binding(name)
            .ok_or_else(|| DiError::NotInjected {
                name: name.to_owned(),
            })?;

        let target = self
            .target(&signature)
            .ok_or_else(|| DiError::SignatureNotFound {
                name: name.to_owned(),
            })?;

        #[cfg(feature = "logging")]
        trace!(
            target: "keyed_injector",
            name,
            kind = ?kind,
            source = ?target,
            "Invoking injected name"
        );

        match kind {
            InjectionKind::Instance => Ok(Invoked::Target(target)),
            InjectionKind::Method => {
                let args = Args::new(name, args);
                target.call(name, &args).map(Invoked::Returned)
            }
        }
    }

    fn target(&self, signature: &Signature) -> Option<Target> {
        let (kind, index) = self.inner.signatures.lookup(signature)?;
        match kind {
            SourceKind::Delegate => self
                .inner
                .delegates
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(index)
                .cloned()
                .map(Target::Delegate),
            SourceKind::Provider => self.inner.providers.nth(index).map(Target::Provider),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn classes(&self) -> &ClassRegistry {
        &self.inner.classes
    }

    #[inline]
    pub fn definitions(&self) -> &DefinitionAggregate {
        &self.inner.definitions
    }

    #[inline]
    pub fn providers(&self) -> &ProviderAggregate {
        &self.inner.providers
    }

    /// Delegates in chain order
    pub fn delegates(&self) -> Vec<Arc<dyn Delegate>> {
        self.inner
            .delegates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of stored definitions
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.definitions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.definitions.is_empty()
    }

    #[inline]
    pub fn detects_cycles(&self) -> bool {
        self.inner.detect_cycles
    }

    #[inline]
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer(Arc::downgrade(&self.inner))
    }

    /// Whether both handles point at the same container
    #[inline]
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.inner.definitions.len())
            .field("providers", &self.inner.providers.len())
            .field("delegates", &self.delegates().len())
            .field("classes", &self.inner.classes.len())
            .field("detect_cycles", &self.inner.detect_cycles)
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures a [`Container`] before it is created.
///
/// ```rust
/// use keyed_injector::{Container, ParameterResolver};
///
/// let parameters = ParameterResolver::new();
/// parameters.add_parameter("debug", true);
///
/// let container = Container::builder()
///     .capacity(64)
///     .with_parameters(parameters)
///     .with_autowiring()
///     .build();
///
/// assert!(container.has("debug"));
/// assert_eq!(container.delegates().len(), 2);
/// ```
#[derive(Debug)]
pub struct ContainerBuilder {
    capacity: Option<usize>,
    detect_cycles: bool,
    autowiring: bool,
    parameters: Option<ParameterResolver>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            capacity: None,
            detect_cycles: true,
            autowiring: false,
            parameters: None,
        }
    }

    /// Pre-size the definition storage
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Fail re-entrant resolutions with [`DiError::CircularDependency`].
    /// On by default.
    pub fn detect_cycles(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }

    /// Append an [`AutowireResolver`] to the delegate chain
    pub fn with_autowiring(mut self) -> Self {
        self.autowiring = true;
        self
    }

    /// Put a [`ParameterResolver`] first in the delegate chain
    pub fn with_parameters(mut self, parameters: ParameterResolver) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn build(self) -> Container {
        let definitions = match self.capacity {
            Some(capacity) => DefinitionAggregate::with_capacity(capacity),
            None => DefinitionAggregate::new(),
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            capacity = ?self.capacity,
            detect_cycles = self.detect_cycles,
            autowiring = self.autowiring,
            "Creating new DI container"
        );

        let container = Container {
            inner: Arc::new(Inner {
                definitions,
                providers: ProviderAggregate::new(),
                delegates: RwLock::new(Vec::new()),
                signatures: SignatureTable::new(),
                classes: ClassRegistry::new(),
                detect_cycles: self.detect_cycles,
            }),
        };

        if let Some(parameters) = self.parameters {
            container.add_delegate(parameters, false);
        }
        if self.autowiring {
            container.add_delegate(AutowireResolver::new(), false);
        }
        container
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arg;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StaticDelegate {
        id: &'static str,
        value: &'static str,
    }

    impl StaticDelegate {
        fn new(id: &'static str, value: &'static str) -> Self {
            Self { id, value }
        }
    }

    impl Delegate for StaticDelegate {
        fn has(&self, id: &str) -> bool {
            id == self.id
        }

        fn get(&self, _: &str) -> Result<Instance> {
            Ok(Arc::new(self.value))
        }
    }

    struct LyingProvider;

    impl Provider for LyingProvider {
        fn provides(&self, id: &str) -> bool {
            id == "promised"
        }

        fn register(&self, container: &Container) -> Result<()> {
            container.add_concrete("something.else", Concrete::literal(0u8));
            Ok(())
        }
    }

    struct GreetingProvider {
        runs: Arc<AtomicU32>,
    }

    impl Provider for GreetingProvider {
        fn provides(&self, id: &str) -> bool {
            id.starts_with("greeting.")
        }

        fn register(&self, container: &Container) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            container.add_concrete("greeting.en", Concrete::literal("hello"));
            container.add_concrete("greeting.fr", Concrete::literal("bonjour"));
            Ok(())
        }

        fn call(&self, method: &str, _: &Args) -> Result<Option<Instance>> {
            match method {
                "languages" => Ok(Some(Arc::new(2usize))),
                _ => Err(DiError::method_not_found("GreetingProvider", method)),
            }
        }
    }

    /// Builds what it registers right away
    struct EagerProvider;

    impl Provider for EagerProvider {
        fn provides(&self, id: &str) -> bool {
            id == "logger"
        }

        fn register(&self, container: &Container) -> Result<()> {
            let stderr = Concrete::literal(String::from("stderr"));
            container.add_shared_concrete("logger", stderr);
            container.resolve("logger")?;
            Ok(())
        }
    }

    #[test]
    fn test_shared() {
        let container = Container::new();
        container.add_shared_concrete("counter", Concrete::factory(|_, _| Ok(AtomicU32::new(0))));

        let a = container.resolve("counter").unwrap();
        let b = container.resolve("counter").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let fresh = container.resolve_new("counter").unwrap();
        assert!(!Arc::ptr_eq(&a, &fresh));
        assert!(Arc::ptr_eq(&a, &container.resolve("counter").unwrap()));
    }

    #[test]
    fn test_transient() {
        let container = Container::new();
        container.add_concrete("counter", Concrete::factory(|_, _| Ok(AtomicU32::new(0))));

        let a = container.resolve("counter").unwrap();
        let b = container.resolve("counter").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_not_found() {
        let container = Container::new();
        let err = container.resolve("nonexistent").unwrap_err();
        assert!(matches!(err, DiError::NotFound { .. }));
        assert!(!container.has("nonexistent"));
    }

    #[test]
    fn test_get_returns_definition_or_value() {
        let container = Container::new();
        container.add("Foo");
        container.add_delegate(StaticDelegate::new("name", "x"), false);

        assert!(container.get("Foo").unwrap().is_definition());
        let value = container.get("name").unwrap().into_value().unwrap();
        assert_eq!(*value.downcast::<&str>().unwrap(), "x");
    }

    #[test]
    fn test_provider_is_lazy_and_runs_once() {
        let runs = Arc::new(AtomicU32::new(0));
        let container = Container::new();
        container.add_provider(GreetingProvider { runs: runs.clone() }, false);

        assert!(container.has("greeting.en"));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let en = container.resolve_as::<&str>("greeting.en").unwrap();
        let fr = container.resolve_as::<&str>("greeting.fr").unwrap();
        container.resolve("greeting.en").unwrap();

        assert_eq!(*en, "hello");
        assert_eq!(*fr, "bonjour");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provider_lied() {
        let container = Container::new();
        container.add_provider(LyingProvider, false);

        let err = container.resolve("promised").unwrap_err();
        assert!(matches!(err, DiError::ProviderLied { .. }));
        assert!(err.is_container_error());
    }

    #[test]
    fn test_provider_may_resolve_what_it_registers() {
        let container = Container::new();
        container.add_provider(EagerProvider, false);

        let logger = container.resolve_as::<String>("logger").unwrap();
        assert_eq!(*logger, "stderr");
        assert!(Arc::ptr_eq(&logger, &container.resolve_as::<String>("logger").unwrap()));
    }

    #[test]
    fn test_delegate_order() {
        let container = Container::new();
        container.add_delegate(StaticDelegate::new("key", "first"), false);
        container.add_delegate(StaticDelegate::new("key", "second"), false);

        let value = container.resolve_as::<&str>("key").unwrap();
        assert_eq!(*value, "first");
    }

    #[test]
    fn test_definitions_win_over_delegates() {
        let container = Container::new();
        container.add_delegate(StaticDelegate::new("key", "delegate"), false);
        container.add_concrete("key", Concrete::literal("definition"));

        assert_eq!(*container.resolve_as::<&str>("key").unwrap(), "definition");
    }

    #[test]
    fn test_modify() {
        let container = Container::new();
        container.add_concrete("value", Concrete::factory(|_, _| Ok(1u8)));

        container.modify("value").unwrap().set_shared(true);
        let a = container.resolve("value").unwrap();
        let b = container.resolve("value").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let err = container.modify("missing").unwrap_err();
        assert!(matches!(err, DiError::NotModifiable { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_type_mismatch() {
        let container = Container::new();
        container.add_concrete("n", Concrete::literal(1u8));

        let err = container.resolve_as::<String>("n").unwrap_err();
        assert!(matches!(err, DiError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unregistered_class_resolves_to_identifier() {
        let container = Container::new();
        container.add("app.name");

        let value = container.resolve_as::<String>("app.name").unwrap();
        assert_eq!(*value, "app.name");
    }

    #[test]
    fn test_cycle_detected() {
        let container = Container::new();
        container.add_concrete("a", Concrete::factory(|_, args| Ok(args.len()))).add_argument("b");
        container
            .add_concrete("b", Concrete::factory(|_, args| Ok(args.len())))
            .add_argument(Arg::id("a"));

        let err = container.resolve("a").unwrap_err();
        match err {
            DiError::CircularDependency { chain } => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }

        // the stack unwinds after a failure
        container.add_concrete("b", Concrete::literal(0usize));
        assert!(container.resolve("a").is_ok());
    }

    #[test]
    fn test_invoke_injected_provider() {
        let container = Container::new();
        let signature = container
            .add_provider(
                GreetingProvider {
                    runs: Arc::new(AtomicU32::new(0)),
                },
                true,
            )
            .unwrap();

        container.inject_method(&signature, "languages").unwrap();
        container.inject_instance(&signature, "greetings").unwrap();

        let count = container.invoke("languages", Vec::new()).unwrap();
        assert_eq!(*count.value_as::<usize>().unwrap(), 2);

        let target = container.invoke("greetings", Vec::new()).unwrap().target().unwrap();
        assert!(target.downcast_ref::<GreetingProvider>().is_some());
    }

    #[test]
    fn test_signing_duplicate_provider_returns_existing_signature() {
        let runs = Arc::new(AtomicU32::new(0));
        let container = Container::new();
        container.add_provider(LyingProvider, false);

        let first = container
            .add_provider(GreetingProvider { runs: runs.clone() }, true)
            .unwrap();
        let again = container
            .add_provider(GreetingProvider { runs: runs.clone() }, true)
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(container.providers().len(), 2);
        assert_eq!(
            container.inner.signatures.lookup(&first),
            Some((SourceKind::Provider, 1))
        );
        let target = container.target(&again).unwrap();
        assert!(target.downcast_ref::<GreetingProvider>().is_some());
    }

    #[test]
    fn test_invoke_errors() {
        let container = Container::new();
        let err = container.invoke("nothing", Vec::new()).unwrap_err();
        assert!(matches!(err, DiError::NotInjected { .. }));

        let err = container
            .inject(&Signature::from("0000"), "x", InjectionKind::Method)
            .unwrap_err();
        assert!(matches!(err, DiError::InvalidSignature { .. }));
    }

    #[test]
    fn test_signed_delegate_is_not_attached() {
        let container = Container::new();
        let signature = container.add_delegate(AutowireResolver::new(), true).unwrap();
        container.inject_instance(&signature, "autowire").unwrap();
        container.register_class(Class::named::<u8>("Byte").default_constructor().build());

        // present in the chain, but unattached so it answers no
        assert!(!container.has("Byte"));

        let target = container.invoke("autowire", Vec::new()).unwrap().target().unwrap();
        assert!(target.as_delegate().is_some());
        assert!(target.downcast_ref::<AutowireResolver>().is_some());
    }

    #[test]
    fn test_builder() {
        let parameters = ParameterResolver::new();
        parameters.add_parameter("debug", true);

        let container = Container::builder()
            .capacity(128)
            .detect_cycles(false)
            .with_parameters(parameters)
            .build();

        assert!(!container.detects_cycles());
        assert!(*container.resolve_as::<bool>("debug").unwrap());
        assert!(container.is_empty());
    }

    #[test]
    fn test_weak_handle() {
        let container = Container::new();
        let weak = container.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&container));

        drop(container);
        assert!(weak.upgrade().is_none());
    }
}
