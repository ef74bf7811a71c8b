//! Signed access to delegates and providers
//!
//! Registering a delegate or provider "with signing" yields a [`Signature`]
//! naming its position. Binding a name to a signature lets
//! [`Container::invoke`](crate::Container::invoke) either return the signed
//! object itself or forward a call to one of its named operations.

use crate::class::Args;
use crate::delegate::Delegate;
use crate::provider::Provider;
use crate::{DiError, Instance, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::Any;
use std::hash::BuildHasher;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Opaque token identifying a signed delegate or provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Fixed seeds so equal inputs always sign alike
    fn hasher() -> RandomState {
        RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        )
    }

    fn compute(kind: SourceKind, type_name: &str, index: usize) -> Self {
        let hash = Self::hasher().hash_one((kind, type_name, index));
        Signature(format!("{hash:016x}"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Signature {
    fn from(token: String) -> Self {
        Signature(token)
    }
}

impl From<&str> for Signature {
    fn from(token: &str) -> Self {
        Signature(token.to_owned())
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a signed object lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Delegate,
    Provider,
}

/// How an injected name behaves when invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InjectionKind {
    /// Forward the call to the operation of the same name
    #[default]
    Method,
    /// Return the signed object itself
    Instance,
}

/// A signed delegate or provider
#[derive(Clone)]
pub enum Target {
    Delegate(Arc<dyn Delegate>),
    Provider(Arc<dyn Provider>),
}

impl Target {
    pub fn as_delegate(&self) -> Option<&Arc<dyn Delegate>> {
        match self {
            Target::Delegate(delegate) => Some(delegate),
            Target::Provider(_) => None,
        }
    }

    pub fn as_provider(&self) -> Option<&Arc<dyn Provider>> {
        match self {
            Target::Provider(provider) => Some(provider),
            Target::Delegate(_) => None,
        }
    }

    /// Borrow the concrete object behind the target
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Target::Delegate(delegate) => (**delegate).as_any().downcast_ref(),
            Target::Provider(provider) => (**provider).as_any().downcast_ref(),
        }
    }

    pub(crate) fn call(&self, method: &str, args: &Args) -> Result<Option<Instance>> {
        match self {
            Target::Delegate(delegate) => delegate.call(method, args),
            Target::Provider(provider) => provider.call(method, args),
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Delegate(delegate) => f
                .debug_tuple("Delegate")
                .field(&(**delegate).type_name())
                .finish(),
            Target::Provider(provider) => f
                .debug_tuple("Provider")
                .field(&provider.identifier())
                .finish(),
        }
    }
}

/// Result of [`Container::invoke`](crate::Container::invoke)
#[derive(Debug)]
pub enum Invoked {
    /// What a forwarded method call returned
    Returned(Option<Instance>),
    /// The signed object, for names injected as instances
    Target(Target),
}

impl Invoked {
    /// The returned value, if this was a method call that returned one
    pub fn value(self) -> Option<Instance> {
        match self {
            Invoked::Returned(value) => value,
            Invoked::Target(_) => None,
        }
    }

    /// The returned value downcast to `T`
    pub fn value_as<T: Any + Send + Sync>(self) -> Option<Arc<T>> {
        self.value().and_then(|value| value.downcast::<T>().ok())
    }

    pub fn target(self) -> Option<Target> {
        match self {
            Invoked::Target(target) => Some(target),
            Invoked::Returned(_) => None,
        }
    }
}

/// Signature and injection tables.
pub struct SignatureTable {
    signatures: DashMap<Signature, (SourceKind, usize), RandomState>,
    injections: DashMap<String, (Signature, InjectionKind), RandomState>,
}

impl SignatureTable {
    pub fn new() -> Self {
        Self {
            signatures: DashMap::with_hasher(RandomState::new()),
            injections: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Record the source at `index` and return its signature
    pub fn sign(&self, kind: SourceKind, type_name: &str, index: usize) -> Signature {
        let signature = Signature::compute(kind, type_name, index);

        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            signature = %signature,
            source = ?kind,
            index,
            "Signing {}",
            type_name
        );

        self.signatures.insert(signature.clone(), (kind, index));
        signature
    }

    #[inline]
    pub fn contains(&self, signature: &Signature) -> bool {
        self.signatures.contains_key(signature)
    }

    pub fn lookup(&self, signature: &Signature) -> Option<(SourceKind, usize)> {
        self.signatures.get(signature).map(|entry| *entry.value())
    }

    /// Bind `name` to `signature`; a later bind of the same name wins
    pub fn bind(
        &self,
        signature: &Signature,
        name: impl Into<String>,
        kind: InjectionKind,
    ) -> Result<()> {
        if !self.contains(signature) {
            return Err(DiError::InvalidSignature {
                signature: signature.to_string(),
            });
        }

        let name = name.into();

        #[cfg(feature = "logging")]
        debug!(
            target: "keyed_injector",
            signature = %signature,
            name = %name,
            kind = ?kind,
            "Injecting signed source"
        );

        self.injections.insert(name, (signature.clone(), kind));
        Ok(())
    }

    pub fn binding(&self, name: &str) -> Option<(Signature, InjectionKind)> {
        self.injections.get(name).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl Default for SignatureTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignatureTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureTable")
            .field("signatures", &self.signatures.len())
            .field("injections", &self.injections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_deterministic() {
        let a = Signature::compute(SourceKind::Delegate, "Params", 0);
        let b = Signature::compute(SourceKind::Delegate, "Params", 0);
        let c = Signature::compute(SourceKind::Delegate, "Params", 1);
        let d = Signature::compute(SourceKind::Provider, "Params", 0);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_bind_requires_known_signature() {
        let table = SignatureTable::new();
        let err = table
            .bind(&Signature::from("bogus"), "x", InjectionKind::Method)
            .unwrap_err();
        assert!(matches!(err, DiError::InvalidSignature { .. }));

        let signature = table.sign(SourceKind::Provider, "P", 2);
        table.bind(&signature, "x", InjectionKind::Instance).unwrap();
        assert_eq!(table.lookup(&signature), Some((SourceKind::Provider, 2)));
        assert_eq!(table.binding("x"), Some((signature, InjectionKind::Instance)));
    }

    #[test]
    fn test_last_bind_wins() {
        let table = SignatureTable::new();
        let first = table.sign(SourceKind::Delegate, "A", 0);
        let second = table.sign(SourceKind::Delegate, "B", 1);

        table.bind(&first, "name", InjectionKind::Method).unwrap();
        table.bind(&second, "name", InjectionKind::Instance).unwrap();

        assert_eq!(table.binding("name"), Some((second, InjectionKind::Instance)));
    }
}
