//! Autowiring delegate
//!
//! [`AutowireResolver`] builds any type registered in the container's class
//! table by resolving its constructor parameters one at a time. For each
//! parameter, in declaration order, the first rule that applies wins:
//!
//! 1. an override keyed by the parameter name (never for union types)
//! 2. for class and union types: the container's registration for the type,
//!    then null when the parameter is nullable, then (single class types only)
//!    a recursive autowire when the type is instantiable
//! 3. for builtin and untyped parameters: the declared default
//!
//! A parameter no rule covers fails with
//! [`DiError::UnresolvedDependency`].

use crate::class::{Class, Param, ParamType};
use crate::delegate::{ContainerAware, ContainerSlot, Delegate};
use crate::{Container, DiError, Instance, Result};
use ahash::RandomState;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Per-call constructor overrides, keyed by parameter name.
#[derive(Clone, Default)]
pub struct Overrides {
    values: HashMap<String, Instance, RandomState>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the parameter `name` with `value`
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.values.insert(name.into(), Arc::new(value));
        self
    }

    pub fn with_instance(mut self, name: impl Into<String>, value: Instance) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.values.get(name)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Overrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// Delegate that constructs registered classes on demand.
///
/// # Examples
///
/// ```rust
/// use keyed_injector::{Class, Container, Param};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Clock;
///
/// struct Scheduler {
///     clock: Arc<Clock>,
/// }
///
/// let container = Container::builder().with_autowiring().build();
/// container.register_class(Class::of::<Clock>().default_constructor().build());
/// container.register_class(
///     Class::named::<Scheduler>("Scheduler")
///         .param(Param::class::<Clock>("clock"))
///         .constructor(|args| Ok(Scheduler { clock: args.get::<Clock>(0)? }))
///         .build(),
/// );
///
/// assert!(container.has("Scheduler"));
/// let scheduler = container.resolve_as::<Scheduler>("Scheduler").unwrap();
/// let _clock: &Clock = &scheduler.clock;
/// ```
#[derive(Debug, Default)]
pub struct AutowireResolver {
    container: ContainerSlot,
}

impl AutowireResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver already attached to `container`
    pub fn attached(container: &Container) -> Self {
        let resolver = Self::new();
        resolver.container.set(container);
        resolver
    }

    /// Build `id`, preferring `overrides` for matching parameter names
    pub fn get_with(&self, id: &str, overrides: &Overrides) -> Result<Instance> {
        let container = self.container.get()?;
        self.autowire(&container, id, overrides)
    }

    fn autowire(&self, container: &Container, id: &str, overrides: &Overrides) -> Result<Instance> {
        let class = container
            .classes()
            .get(id)
            .ok_or_else(|| DiError::UnknownClass { id: id.to_owned() })?;

        if !class.is_instantiable() {
            return Err(DiError::NotInstantiable { id: id.to_owned() });
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            class = id,
            params = class.params().len(),
            "Autowiring class"
        );

        let mut values = Vec::with_capacity(class.params().len());
        for param in class.params() {
            values.push(self.resolve_param(container, &class, param, overrides)?);
        }
        class.instantiate(values)
    }

    fn resolve_param(
        &self,
        container: &Container,
        class: &Class,
        param: &Param,
        overrides: &Overrides,
    ) -> Result<Option<Instance>> {
        if !param.ty().is_union() {
            if let Some(value) = overrides.get(param.name()) {
                return Ok(Some(Arc::clone(value)));
            }
        }

        let unresolved = || DiError::UnresolvedDependency {
            class: class.name().to_owned(),
            param: param.name().to_owned(),
        };

        match param.ty() {
            ParamType::Class(ty) => {
                if container.has(ty) {
                    return container.resolve(ty).map(Some);
                }
                if param.is_nullable() {
                    return Ok(None);
                }
                match container.classes().get(ty) {
                    Some(dependency) if dependency.is_instantiable() => {
                        #[cfg(feature = "logging")]
                        trace!(
                            target: "keyed_injector",
                            class = class.name(),
                            param = param.name(),
                            dependency = %ty,
                            "Recursively autowiring dependency"
                        );

                        let _guard = container.enter(ty)?;
                        self.autowire(container, ty, &Overrides::new()).map(Some)
                    }
                    _ => Err(unresolved()),
                }
            }
            ParamType::Union(candidates) => {
                if let Some(ty) = candidates.iter().find(|ty| container.has(ty)) {
                    return container.resolve(ty).map(Some);
                }
                if param.is_nullable() {
                    return Ok(None);
                }
                Err(unresolved())
            }
            ParamType::Builtin(_) | ParamType::Untyped => {
                param.default_slot().ok_or_else(unresolved)
            }
        }
    }
}

impl Delegate for AutowireResolver {
    /// True for every class in the attached container's class table
    fn has(&self, id: &str) -> bool {
        self.container
            .get()
            .map(|container| container.classes().contains(id))
            .unwrap_or(false)
    }

    fn get(&self, id: &str) -> Result<Instance> {
        self.get_with(id, &Overrides::new())
    }

    fn container_aware(&self) -> Option<&dyn ContainerAware> {
        Some(self)
    }
}

impl ContainerAware for AutowireResolver {
    fn set_container(&self, container: &Container) {
        self.container.set(container);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Concrete;

    #[derive(Default)]
    struct Bar;

    struct Foo {
        bar: Arc<Bar>,
        retries: u32,
    }

    struct Optional {
        bar: Option<Arc<Bar>>,
    }

    trait Cache: Send + Sync {}

    struct NeedsCache {
        _cache: Arc<dyn Any + Send + Sync>,
    }

    fn foo_class() -> Class {
        Class::named::<Foo>("Foo")
            .param(Param::class_named("bar", "Bar"))
            .param(Param::builtin("retries", "u32").with_default(3u32))
            .constructor(|args| {
                Ok(Foo {
                    bar: args.get::<Bar>(0)?,
                    retries: args.value::<u32>(1)?,
                })
            })
            .build()
    }

    fn bar_class() -> Class {
        Class::named::<Bar>("Bar").default_constructor().build()
    }

    #[test]
    fn test_unattached() {
        let resolver = AutowireResolver::new();
        assert!(!Delegate::has(&resolver, "Foo"));
        assert!(matches!(resolver.get("Foo"), Err(DiError::NoContainer)));
    }

    #[test]
    fn test_unknown_class() {
        let container = Container::new();
        let resolver = AutowireResolver::attached(&container);
        let err = resolver.get("Nope").err().unwrap();
        assert!(matches!(err, DiError::UnknownClass { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_recursive_autowire_without_delegate() {
        let container = Container::new();
        container.register_class(foo_class());
        container.register_class(bar_class());

        let resolver = AutowireResolver::attached(&container);
        let foo = resolver.get("Foo").unwrap().downcast::<Foo>().ok().unwrap();
        assert_eq!(foo.retries, 3);
        let _bar: &Bar = &foo.bar;
    }

    #[test]
    fn test_prefers_container_registration() {
        let container = Container::new();
        container.register_class(foo_class());
        container.register_class(bar_class());
        container.add_shared_concrete("Bar", Concrete::literal(Bar));

        let resolver = AutowireResolver::attached(&container);
        let a = resolver.get("Foo").unwrap().downcast::<Foo>().ok().unwrap();
        let b = resolver.get("Foo").unwrap().downcast::<Foo>().ok().unwrap();
        assert!(Arc::ptr_eq(&a.bar, &b.bar));
    }

    #[test]
    fn test_override_by_name() {
        let container = Container::new();
        container.register_class(foo_class());
        container.register_class(bar_class());

        let resolver = AutowireResolver::attached(&container);
        let overrides = Overrides::new().with("retries", 9u32);
        let foo = resolver
            .get_with("Foo", &overrides)
            .unwrap()
            .downcast::<Foo>()
            .ok()
            .unwrap();
        assert_eq!(foo.retries, 9);
    }

    #[test]
    fn test_union_ignores_override() {
        let container = Container::new();
        container.register_class(bar_class());
        container.register_class(
            Class::named::<Optional>("Either")
                .param(Param::union("bar", ["Baz", "Bar"]))
                .constructor(|args| {
                    Ok(Optional {
                        bar: args.optional::<Bar>(0)?,
                    })
                })
                .build(),
        );
        container.add_concrete("Bar", Concrete::literal(Bar));

        let resolver = AutowireResolver::attached(&container);
        let overrides = Overrides::new().with("bar", 1u8);
        let either = resolver
            .get_with("Either", &overrides)
            .unwrap()
            .downcast::<Optional>()
            .ok()
            .unwrap();
        assert!(either.bar.is_some());
    }

    #[test]
    fn test_nullable_class_param() {
        let container = Container::new();
        container.register_class(
            Class::named::<Optional>("Optional")
                .param(Param::class_named("bar", "Missing").nullable())
                .constructor(|args| {
                    Ok(Optional {
                        bar: args.optional::<Bar>(0)?,
                    })
                })
                .build(),
        );

        let resolver = AutowireResolver::attached(&container);
        let optional = resolver
            .get("Optional")
            .unwrap()
            .downcast::<Optional>()
            .ok()
            .unwrap();
        assert!(optional.bar.is_none());
    }

    #[test]
    fn test_unresolvable_abstract_dependency() {
        let container = Container::new();
        container.register_class(Class::abstract_of::<dyn Cache>());
        container.register_class(
            Class::named::<NeedsCache>("NeedsCache")
                .param(Param::class::<dyn Cache>("cache"))
                .constructor(|args| {
                    Ok(NeedsCache {
                        _cache: args.raw(0).cloned().unwrap(),
                    })
                })
                .build(),
        );

        let resolver = AutowireResolver::attached(&container);
        let err = resolver.get("NeedsCache").err().unwrap();
        assert!(matches!(err, DiError::UnresolvedDependency { .. }));
        assert!(err.is_invalid_argument());

        let err = resolver.get(std::any::type_name::<dyn Cache>()).err().unwrap();
        assert!(matches!(err, DiError::NotInstantiable { .. }));
    }

    #[test]
    fn test_builtin_without_default() {
        let container = Container::new();
        container.register_class(
            Class::named::<Bar>("Strict")
                .param(Param::builtin("level", "u8"))
                .constructor(|_| Ok(Bar))
                .build(),
        );

        let resolver = AutowireResolver::attached(&container);
        let err = resolver.get("Strict").err().unwrap();
        assert!(matches!(err, DiError::UnresolvedDependency { ref param, .. } if param == "level"));
    }
}
