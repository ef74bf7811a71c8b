//! Constructor and method tables
//!
//! Rust has no runtime reflection, so every type the container should be able
//! to build from an identifier is described by a [`Class`]: the ordered
//! constructor parameters (name, declared type, nullability, default), a
//! build closure over positional [`Args`], and a table of named methods that
//! definitions may call after construction.
//!
//! Descriptors are written by hand with [`Class::of`] or generated with
//! `#[derive(Autowire)]` (feature `derive`).
//!
//! # Example
//!
//! ```rust
//! use keyed_injector::{Class, Param};
//! use std::sync::Arc;
//!
//! struct Engine;
//! struct Car {
//!     engine: Arc<Engine>,
//!     wheels: u8,
//! }
//!
//! let class = Class::of::<Car>()
//!     .param(Param::class::<Engine>("engine"))
//!     .param(Param::builtin("wheels", "u8").with_default(4u8))
//!     .constructor(|args| {
//!         Ok(Car {
//!             engine: args.get::<Engine>(0)?,
//!             wheels: args.value::<u8>(1)?,
//!         })
//!     })
//!     .build();
//!
//! assert!(class.is_instantiable());
//! assert_eq!(class.params().len(), 2);
//! ```

use crate::{DiError, Instance, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Types that can describe their own construction.
///
/// Usually derived: `#[derive(Autowire)]` turns every `Arc<T>` field into a
/// class-typed parameter, every `Option<Arc<T>>` field into a nullable one and
/// every other field into a builtin parameter.
pub trait Autowire: Send + Sync + 'static {
    /// The descriptor registered for this type
    fn class() -> Class;
}

// =============================================================================
// Parameters
// =============================================================================

/// Declared type of a constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// No declared type
    Untyped,
    /// Primitive or value type (`u32`, `String`, ...)
    Builtin(&'static str),
    /// A type known by identifier, resolvable through the container
    Class(String),
    /// One of several class identifiers
    Union(Vec<String>),
}

impl ParamType {
    #[inline]
    pub fn is_union(&self) -> bool {
        matches!(self, ParamType::Union(_))
    }

    /// True for `Untyped` and `Builtin`
    #[inline]
    pub fn is_builtin(&self) -> bool {
        matches!(self, ParamType::Untyped | ParamType::Builtin(_))
    }
}

#[derive(Clone)]
enum DefaultValue {
    Value(Instance),
    Null,
}

/// One constructor parameter.
#[derive(Clone)]
pub struct Param {
    name: String,
    ty: ParamType,
    nullable: bool,
    default: Option<DefaultValue>,
}

impl Param {
    fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: None,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Untyped)
    }

    pub fn builtin(name: impl Into<String>, ty: &'static str) -> Self {
        Self::new(name, ParamType::Builtin(ty))
    }

    /// Parameter typed by a Rust type, identified by its type name
    pub fn class<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Class(std::any::type_name::<T>().to_owned()))
    }

    /// Parameter typed by an arbitrary class identifier
    pub fn class_named(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self::new(name, ParamType::Class(class.into()))
    }

    pub fn union<I, S>(name: impl Into<String>, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            ParamType::Union(classes.into_iter().map(Into::into).collect()),
        )
    }

    /// Allow null for this parameter
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.default = Some(DefaultValue::Value(Arc::new(value)));
        self
    }

    /// Default to null; this also makes the parameter nullable
    pub fn with_default_null(mut self) -> Self {
        self.nullable = true;
        self.default = Some(DefaultValue::Null);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> &ParamType {
        &self.ty
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// The default as an argument slot: `Some(None)` is a null default
    pub(crate) fn default_slot(&self) -> Option<Option<Instance>> {
        self.default.as_ref().map(|default| match default {
            DefaultValue::Value(value) => Some(Arc::clone(value)),
            DefaultValue::Null => None,
        })
    }
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("nullable", &self.nullable)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

// =============================================================================
// Arguments
// =============================================================================

/// Positional arguments handed to constructors, factories and methods.
///
/// A slot holds either a value or null. Accessors fail with
/// [`DiError::InvalidArgument`] when the slot is missing, null or of another
/// type.
pub struct Args {
    owner: String,
    names: Vec<String>,
    values: Vec<Option<Instance>>,
}

impl Args {
    /// Positional, non-null arguments for `owner`
    pub fn new(owner: impl Into<String>, values: Vec<Instance>) -> Self {
        Self {
            owner: owner.into(),
            names: Vec::new(),
            values: values.into_iter().map(Some).collect(),
        }
    }

    pub fn empty(owner: impl Into<String>) -> Self {
        Self::new(owner, Vec::new())
    }

    pub(crate) fn with_params(
        owner: impl Into<String>,
        params: &[Param],
        values: Vec<Option<Instance>>,
    ) -> Self {
        Self {
            owner: owner.into(),
            names: params.iter().map(|p| p.name.clone()).collect(),
            values,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw value at `index`, `None` when missing or null
    #[inline]
    pub fn raw(&self, index: usize) -> Option<&Instance> {
        self.values.get(index).and_then(Option::as_ref)
    }

    #[inline]
    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(None))
    }

    /// A required argument of type `T`
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        match self.values.get(index) {
            None => Err(DiError::invalid_argument(format!(
                "missing {}",
                self.label(index)
            ))),
            Some(None) => Err(DiError::invalid_argument(format!(
                "{} is null",
                self.label(index)
            ))),
            Some(Some(value)) => self.downcast(index, value),
        }
    }

    /// An argument of type `T` that may be null or absent
    pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> Result<Option<Arc<T>>> {
        match self.values.get(index) {
            Some(Some(value)) => self.downcast(index, value).map(Some),
            _ => Ok(None),
        }
    }

    /// A required argument cloned out of its shared slot
    pub fn value<T: Any + Send + Sync + Clone>(&self, index: usize) -> Result<T> {
        self.get::<T>(index).map(|value| T::clone(&value))
    }

    /// A string argument given either as `String` or `&'static str`
    pub fn string(&self, index: usize) -> Result<String> {
        let value = self.raw(index).ok_or_else(|| {
            DiError::invalid_argument(format!("missing or null {}", self.label(index)))
        })?;

        if let Some(s) = value.downcast_ref::<String>() {
            return Ok(s.clone());
        }
        if let Some(s) = value.downcast_ref::<&'static str>() {
            return Ok((*s).to_owned());
        }
        Err(DiError::invalid_argument(format!(
            "{} is not a string",
            self.label(index)
        )))
    }

    fn downcast<T: Any + Send + Sync>(&self, index: usize, value: &Instance) -> Result<Arc<T>> {
        Arc::clone(value).downcast::<T>().map_err(|_| {
            DiError::invalid_argument(format!(
                "{} is not of type {}",
                self.label(index),
                std::any::type_name::<T>()
            ))
        })
    }

    fn label(&self, index: usize) -> String {
        match self.names.get(index) {
            Some(name) => format!("argument #{index} (${name}) of {}", self.owner),
            None => format!("argument #{index} of {}", self.owner),
        }
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("owner", &self.owner)
            .field("len", &self.values.len())
            .finish()
    }
}

// =============================================================================
// Class descriptors
// =============================================================================

/// Type-erased constructor
pub type ConstructFn = Arc<dyn Fn(&Args) -> Result<Instance> + Send + Sync>;

/// Type-erased method: receives the built instance and its call arguments
pub type MethodFn = Arc<dyn Fn(&Instance, &Args) -> Result<Option<Instance>> + Send + Sync>;

type BareFn = Arc<dyn Fn() -> Instance + Send + Sync>;

enum Construction {
    /// Known type, never constructed (interfaces, trait objects)
    Abstract,
    /// No constructor; built from `Default`
    Bare(BareFn),
    Constructor {
        params: Vec<Param>,
        build: ConstructFn,
    },
}

/// Describes how to build and operate on one type.
pub struct Class {
    name: String,
    type_id: Option<TypeId>,
    construction: Construction,
    methods: HashMap<String, MethodFn, RandomState>,
}

impl Class {
    /// Start describing `T`, identified by its type name
    pub fn of<T: Send + Sync + 'static>() -> ClassBuilder<T> {
        ClassBuilder::new(std::any::type_name::<T>())
    }

    /// Start describing `T` under a custom identifier
    pub fn named<T: Send + Sync + 'static>(name: impl Into<String>) -> ClassBuilder<T> {
        ClassBuilder::new(name)
    }

    /// A known, non-instantiable type
    pub fn abstract_type(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: None,
            construction: Construction::Abstract,
            methods: HashMap::default(),
        }
    }

    /// A known, non-instantiable Rust type such as `dyn Trait`
    pub fn abstract_of<T: ?Sized + 'static>() -> Self {
        Self::abstract_type(std::any::type_name::<T>())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    #[inline]
    pub fn is_instantiable(&self) -> bool {
        !matches!(self.construction, Construction::Abstract)
    }

    #[inline]
    pub fn has_constructor(&self) -> bool {
        matches!(self.construction, Construction::Constructor { .. })
    }

    /// Constructor parameters in declaration order (empty without constructor)
    pub fn params(&self) -> &[Param] {
        match &self.construction {
            Construction::Constructor { params, .. } => params,
            _ => &[],
        }
    }

    #[inline]
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Construct from positional argument slots.
    ///
    /// Trailing parameters without a supplied argument take their declared
    /// default.
    pub fn instantiate(&self, mut values: Vec<Option<Instance>>) -> Result<Instance> {
        match &self.construction {
            Construction::Abstract => Err(DiError::NotInstantiable {
                id: self.name.clone(),
            }),
            Construction::Bare(bare) => {
                if !values.is_empty() {
                    return Err(DiError::creation_failed(
                        &self.name,
                        "class has no constructor, so no constructor arguments can be passed",
                    ));
                }
                Ok(bare())
            }
            Construction::Constructor { params, build } => {
                for param in params.iter().skip(values.len()) {
                    match param.default_slot() {
                        Some(slot) => values.push(slot),
                        None => break,
                    }
                }
                build(&Args::with_params(&self.name, params, values))
            }
        }
    }

    /// Call a named method on an instance of this class
    pub fn call(&self, instance: &Instance, method: &str, args: &Args) -> Result<Option<Instance>> {
        let f = self
            .methods
            .get(method)
            .ok_or_else(|| DiError::method_not_found(&self.name, method))?;
        f(instance, args)
    }
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("instantiable", &self.is_instantiable())
            .field("params", &self.params())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for a [`Class`] describing `T`.
///
/// Without `constructor` or `default_constructor` the class is abstract.
pub struct ClassBuilder<T> {
    name: String,
    params: Vec<Param>,
    build: Option<ConstructFn>,
    bare: Option<BareFn>,
    methods: HashMap<String, MethodFn, RandomState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ClassBuilder<T> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            build: None,
            bare: None,
            methods: HashMap::default(),
            _marker: PhantomData,
        }
    }

    /// Declare the next constructor parameter
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn params<I: IntoIterator<Item = Param>>(mut self, params: I) -> Self {
        self.params.extend(params);
        self
    }

    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Args) -> Result<T> + Send + Sync + 'static,
    {
        self.build = Some(Arc::new(move |args| {
            f(args).map(|value| Arc::new(value) as Instance)
        }));
        self
    }

    /// Register a method callable by name on built instances
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T, &Args) -> Result<Option<Instance>> + Send + Sync + 'static,
    {
        let owner = self.name.clone();
        let method: MethodFn = Arc::new(move |instance: &Instance, args: &Args| {
            let this = instance
                .downcast_ref::<T>()
                .ok_or_else(|| DiError::TypeMismatch {
                    id: owner.clone(),
                    expected: std::any::type_name::<T>(),
                })?;
            f(this, args)
        });
        self.methods.insert(name.into(), method);
        self
    }

    pub fn build(self) -> Class {
        let construction = match (self.build, self.bare) {
            (Some(build), _) => Construction::Constructor {
                params: self.params,
                build,
            },
            (None, Some(bare)) => Construction::Bare(bare),
            (None, None) => Construction::Abstract,
        };

        Class {
            name: self.name,
            type_id: Some(TypeId::of::<T>()),
            construction,
            methods: self.methods,
        }
    }
}

impl<T: Default + Send + Sync + 'static> ClassBuilder<T> {
    /// No constructor: instances are built with `T::default()`
    pub fn default_constructor(mut self) -> Self {
        self.bare = Some(Arc::new(|| Arc::new(T::default()) as Instance));
        self
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Identifier-keyed table of class descriptors.
///
/// Also indexed by `TypeId` so methods can be found for an instance that was
/// produced by a factory or supplied as a literal. That index keeps the last
/// class registered for each Rust type; definitions naming a class look their
/// methods up by identifier instead.
pub struct ClassRegistry {
    classes: DashMap<String, Arc<Class>, RandomState>,
    by_type: DashMap<TypeId, Arc<Class>, RandomState>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self {
            classes: DashMap::with_hasher(RandomState::new()),
            by_type: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Add or replace a class
    pub fn insert(&self, class: Class) -> Arc<Class> {
        let class = Arc::new(class);
        if let Some(type_id) = class.type_id {
            self.by_type.insert(type_id, Arc::clone(&class));
        }
        self.classes.insert(class.name.clone(), Arc::clone(&class));
        class
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<Arc<Class>> {
        self.classes.get(name).map(|c| Arc::clone(c.value()))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// The class describing the concrete type behind `instance`
    pub fn for_instance(&self, instance: &Instance) -> Option<Arc<Class>> {
        // `type_id` must see through the Arc to the erased value
        let type_id = (**instance).type_id();
        self.by_type.get(&type_id).map(|c| Arc::clone(c.value()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("count", &self.len())
            .finish()
    }
}
