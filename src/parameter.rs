//! Key-value parameter delegate

use crate::class::Args;
use crate::delegate::Delegate;
use crate::{DiError, Instance, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Delegate serving plain values stored under identifiers.
///
/// Values come back from the container exactly as stored; they are never
/// built or cached.
///
/// # Examples
///
/// ```rust
/// use keyed_injector::{Container, ParameterResolver};
///
/// let parameters = ParameterResolver::new();
/// parameters.add_parameter("app.name", String::from("shop"));
///
/// let container = Container::new();
/// container.add_delegate(parameters, false);
///
/// let name = container.resolve_as::<String>("app.name").unwrap();
/// assert_eq!(*name, "shop");
/// ```
pub struct ParameterResolver {
    parameters: DashMap<String, Instance, RandomState>,
}

impl ParameterResolver {
    pub fn new() -> Self {
        Self {
            parameters: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Store `value` under `id`, replacing any previous value
    pub fn add_parameter<T: Any + Send + Sync>(&self, id: impl Into<String>, value: T) -> &Self {
        self.add_parameter_instance(id, Arc::new(value))
    }

    /// Store an already type-erased value
    pub fn add_parameter_instance(&self, id: impl Into<String>, value: Instance) -> &Self {
        let id = id.into();

        #[cfg(feature = "logging")]
        debug!(target: "keyed_injector", parameter = %id, "Adding parameter");

        self.parameters.insert(id, value);
        self
    }

    #[inline]
    pub fn has(&self, id: &str) -> bool {
        self.parameters.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Result<Instance> {
        self.parameters
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DiError::not_found(id))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl Default for ParameterResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Delegate for ParameterResolver {
    fn has(&self, id: &str) -> bool {
        ParameterResolver::has(self, id)
    }

    fn get(&self, id: &str) -> Result<Instance> {
        ParameterResolver::get(self, id)
    }

    /// Exposes `add_parameter(id, value)` and `get_parameter(id)`
    fn call(&self, method: &str, args: &Args) -> Result<Option<Instance>> {
        match method {
            "add_parameter" => {
                let id = args.string(0)?;
                let value = args
                    .raw(1)
                    .cloned()
                    .ok_or_else(|| DiError::invalid_argument("add_parameter expects a value"))?;
                self.add_parameter_instance(id, value);
                Ok(None)
            }
            "get_parameter" => self.get(&args.string(0)?).map(Some),
            _ => Err(DiError::method_not_found("ParameterResolver", method)),
        }
    }
}

impl std::fmt::Debug for ParameterResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterResolver")
            .field("count", &self.len())
            .finish()
    }
}
