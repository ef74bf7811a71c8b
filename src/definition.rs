//! Service definitions
//!
//! A [`Definition`] is the recipe for one service: what to build
//! ([`Concrete`]), the ordered constructor arguments, the method calls run on
//! every freshly built instance, and whether the result is shared.
//!
//! Shared definitions cache the first instance they build in a `OnceCell`
//! owned by the definition itself. Forced builds never read or write that
//! cache.

use crate::class::{Args, Class};
use crate::{Container, DiError, Instance, Result};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Concrete
// =============================================================================

/// Type-erased factory function
pub type FactoryFn = Arc<dyn Fn(&Container, &Args) -> Result<Instance> + Send + Sync>;

/// What a definition builds.
#[derive(Clone)]
pub enum Concrete {
    /// A class identifier, constructed through the container's class table.
    /// Identifiers missing from the table are returned as literal strings.
    Class(String),
    /// A factory invoked with the resolved constructor arguments
    Factory(FactoryFn),
    /// A ready-made value
    Literal(Instance),
}

impl Concrete {
    #[inline]
    pub fn class(id: impl Into<String>) -> Self {
        Concrete::Class(id.into())
    }

    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container, &Args) -> Result<T> + Send + Sync + 'static,
    {
        Concrete::Factory(Arc::new(move |container, args| {
            factory(container, args).map(|value| Arc::new(value) as Instance)
        }))
    }

    #[inline]
    pub fn literal<T: Any + Send + Sync>(value: T) -> Self {
        Concrete::Literal(Arc::new(value))
    }

    #[inline]
    pub fn instance(instance: Instance) -> Self {
        Concrete::Literal(instance)
    }
}

impl From<&str> for Concrete {
    fn from(id: &str) -> Self {
        Concrete::Class(id.to_owned())
    }
}

impl From<String> for Concrete {
    fn from(id: String) -> Self {
        Concrete::Class(id)
    }
}

impl std::fmt::Debug for Concrete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Concrete::Class(id) => f.debug_tuple("Class").field(id).finish(),
            Concrete::Factory(_) => f.write_str("Factory(..)"),
            Concrete::Literal(_) => f.write_str("Literal(..)"),
        }
    }
}

// =============================================================================
// Arguments
// =============================================================================

/// A constructor argument that supplies its own value.
pub trait Argument: Send + Sync {
    fn get(&self) -> Instance;
}

/// Argument holding a fixed value
pub struct ValueArgument {
    value: Instance,
}

impl ValueArgument {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
        }
    }
}

impl Argument for ValueArgument {
    #[inline]
    fn get(&self) -> Instance {
        Arc::clone(&self.value)
    }
}

/// One constructor argument.
#[derive(Clone)]
pub enum Arg {
    /// Identifier resolved against the container at build time
    Id(String),
    /// Value supplied by an [`Argument`]
    Value(Arc<dyn Argument>),
}

impl Arg {
    #[inline]
    pub fn id(id: impl Into<String>) -> Self {
        Arg::Id(id.into())
    }

    /// A fixed value, passed as-is
    #[inline]
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Arg::Value(Arc::new(ValueArgument::new(value)))
    }

    #[inline]
    pub fn argument<A: Argument + 'static>(argument: A) -> Self {
        Arg::Value(Arc::new(argument))
    }

    fn resolve(&self, container: &Container) -> Result<Instance> {
        match self {
            Arg::Id(id) if id.is_empty() => Err(DiError::invalid_argument(
                "argument identifier must not be empty",
            )),
            Arg::Id(id) => container.resolve(id),
            Arg::Value(argument) => Ok(argument.get()),
        }
    }
}

impl From<&str> for Arg {
    fn from(id: &str) -> Self {
        Arg::Id(id.to_owned())
    }
}

impl From<String> for Arg {
    fn from(id: String) -> Self {
        Arg::Id(id)
    }
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Arg::Value(_) => f.write_str("Value(..)"),
        }
    }
}

#[derive(Clone)]
struct MethodCall {
    name: String,
    params: Option<Vec<Instance>>,
}

// =============================================================================
// Definition
// =============================================================================

/// Recipe for building one service.
///
/// Configuration methods take `&self` and return `&Self` so a definition can
/// be configured fluently right after it is added:
///
/// ```rust
/// use keyed_injector::{Concrete, Container};
///
/// let container = Container::new();
/// container
///     .add_concrete("greeting", Concrete::literal(String::from("hello")))
///     .set_shared(true);
///
/// let greeting = container.resolve_as::<String>("greeting").unwrap();
/// assert_eq!(*greeting, "hello");
/// ```
pub struct Definition {
    id: String,
    concrete: Concrete,
    shared: AtomicBool,
    arguments: RwLock<Vec<Arg>>,
    method_calls: RwLock<Vec<MethodCall>>,
    instance: OnceCell<Instance>,
}

impl Definition {
    pub fn new(id: impl Into<String>, concrete: Concrete) -> Self {
        Self {
            id: id.into(),
            concrete,
            shared: AtomicBool::new(false),
            arguments: RwLock::new(Vec::new()),
            method_calls: RwLock::new(Vec::new()),
            instance: OnceCell::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn concrete(&self) -> &Concrete {
        &self.concrete
    }

    /// Append a constructor argument
    pub fn add_argument(&self, arg: impl Into<Arg>) -> &Self {
        self.arguments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(arg.into());
        self
    }

    pub fn add_arguments<I, A>(&self, args: I) -> &Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.arguments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(args.into_iter().map(Into::into));
        self
    }

    /// Snapshot of the constructor arguments
    pub fn arguments(&self) -> Vec<Arg> {
        self.arguments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queue a method call on every freshly built instance.
    ///
    /// Calls run in insertion order; queuing the same method again replaces
    /// its parameters and keeps its position.
    pub fn add_method_call(
        &self,
        method: impl Into<String>,
        params: Option<Vec<Instance>>,
    ) -> &Self {
        let name = method.into();
        let mut calls = self
            .method_calls
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match calls.iter_mut().find(|call| call.name == name) {
            Some(call) => call.params = params,
            None => calls.push(MethodCall { name, params }),
        }
        drop(calls);
        self
    }

    pub fn has_method_calls(&self) -> bool {
        !self
            .method_calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn set_shared(&self, shared: bool) -> &Self {
        self.shared.store(shared, Ordering::Release);
        self
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.shared.load(Ordering::Acquire)
    }

    /// Whether a shared instance has been cached
    #[inline]
    pub fn has_instance(&self) -> bool {
        self.instance.get().is_some()
    }

    /// Produce the service.
    ///
    /// A shared definition returns its cached instance unless `force_new` is
    /// set; the first non-forced build of a shared definition fills the cache.
    /// Method calls run on every fresh build, forced or not.
    pub fn make(&self, container: &Container, force_new: bool) -> Result<Instance> {
        let shared = self.is_shared();

        if shared && !force_new {
            if let Some(cached) = self.instance.get() {
                #[cfg(feature = "logging")]
                trace!(
                    target: "keyed_injector",
                    service = %self.id,
                    "Shared service already built, returning cached instance"
                );
                return Ok(Arc::clone(cached));
            }
        }

        let instance = self.build(container)?;
        self.invoke_methods(container, &instance)?;

        if !shared || force_new {
            return Ok(instance);
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            service = %self.id,
            "Caching shared instance on first build"
        );

        Ok(Arc::clone(self.instance.get_or_init(|| instance)))
    }

    /// Build a fresh instance from the concrete, without method calls or
    /// caching
    pub fn build(&self, container: &Container) -> Result<Instance> {
        match &self.concrete {
            Concrete::Class(class_id) => match container.classes().get(class_id) {
                Some(class) => {
                    let values = self.resolve_arguments(container)?;
                    class.instantiate(values.into_iter().map(Some).collect())
                }
                None => Ok(Arc::new(class_id.clone())),
            },
            Concrete::Factory(factory) => {
                let values = self.resolve_arguments(container)?;
                factory(container, &Args::new(&self.id, values))
            }
            Concrete::Literal(value) => Ok(Arc::clone(value)),
        }
    }

    fn resolve_arguments(&self, container: &Container) -> Result<Vec<Instance>> {
        // resolution may re-enter this definition, so release the lock first
        let arguments = self.arguments();
        arguments.iter().map(|arg| arg.resolve(container)).collect()
    }

    fn invoke_methods(&self, container: &Container, instance: &Instance) -> Result<()> {
        let calls = self
            .method_calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(first) = calls.first() else {
            return Ok(());
        };

        // The class this definition names comes first; several classes may
        // describe the same Rust type.
        let classes = container.classes();
        let class = match &self.concrete {
            Concrete::Class(name) => classes
                .get(name)
                .filter(|class| Class::type_id(class) == Some((**instance).type_id())),
            _ => None,
        }
        .or_else(|| classes.for_instance(instance))
        .ok_or_else(|| DiError::method_not_found(&self.id, &first.name))?;

        for call in calls {
            #[cfg(feature = "logging")]
            trace!(
                target: "keyed_injector",
                service = %self.id,
                method = %call.name,
                "Invoking method call on fresh instance"
            );

            let args = Args::new(&call.name, call.params.unwrap_or_default());
            class.call(instance, &call.name, &args)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("id", &self.id)
            .field("concrete", &self.concrete)
            .field("shared", &self.is_shared())
            .field("arguments", &self.arguments())
            .finish()
    }
}
