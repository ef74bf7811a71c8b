#![no_main]

//! Fuzz target for keyed container operations
//!
//! Random definition graphs (including cyclic ones) must resolve or fail
//! cleanly, never overflow the stack or panic.

use arbitrary::Arbitrary;
use keyed_injector::{Arg, Concrete, Container, DiError, ParameterResolver};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

/// Small key space so operations collide
#[derive(Debug, Clone, Copy, Arbitrary)]
struct Key(u8);

impl Key {
    fn id(self) -> String {
        format!("k{}", self.0 % 8)
    }
}

#[derive(Debug, Arbitrary)]
enum ContainerOp {
    AddLiteral { key: Key, value: u32, shared: bool },
    AddDependent {
        key: Key,
        deps: Vec<Key>,
        shared: bool,
    },
    AddParameter { key: Key, value: u32 },
    Resolve { key: Key, force_new: bool },
    Has(Key),
    Get(Key),
    Modify { key: Key, shared: bool },
}

fuzz_target!(|ops: Vec<ContainerOp>| {
    let container = Container::new();
    let signature = container
        .add_delegate(ParameterResolver::new(), true)
        .expect("signed delegate");
    container.inject_instance(&signature, "parameters").unwrap();

    for op in ops {
        match op {
            ContainerOp::AddLiteral { key, value, shared } => {
                let definition = container.add_concrete(key.id(), Concrete::literal(value));
                definition.set_shared(shared);
            }
            ContainerOp::AddDependent { key, deps, shared } => {
                let definition = container.add_concrete(
                    key.id(),
                    Concrete::factory(|_, args| Ok(args.len())),
                );
                definition
                    .set_shared(shared)
                    .add_arguments(deps.into_iter().take(4).map(|k| Arg::id(k.id())));
            }
            ContainerOp::AddParameter { key, value } => {
                let target = container
                    .invoke("parameters", Vec::new())
                    .unwrap()
                    .target()
                    .unwrap();
                target
                    .downcast_ref::<ParameterResolver>()
                    .unwrap()
                    .add_parameter(key.id(), value);
            }
            ContainerOp::Resolve { key, force_new } => {
                let id = key.id();
                let result = if force_new {
                    container.resolve_new(&id)
                } else {
                    container.resolve(&id)
                };
                match result {
                    Ok(first) => {
                        let shared = container
                            .modify(&id)
                            .map(|d| d.is_shared())
                            .unwrap_or(false);
                        if shared && !force_new {
                            let second = container.resolve(&id).unwrap();
                            assert!(Arc::ptr_eq(&first, &second));
                        }
                    }
                    Err(DiError::NotFound { id: missing }) if missing == id => {
                        assert!(!container.has(&id));
                    }
                    Err(DiError::CircularDependency { chain }) => assert!(chain.len() >= 2),
                    Err(other) => {
                        // a dependency further down the graph may be missing
                        assert!(other.is_not_found() || other.is_container_error(), "{other}");
                    }
                }
            }
            ContainerOp::Has(key) => {
                let id = key.id();
                assert_eq!(container.has(&id), container.get(&id).is_ok());
            }
            ContainerOp::Get(key) => {
                let _ = container.get(&key.id());
            }
            ContainerOp::Modify { key, shared } => {
                if let Ok(definition) = container.modify(&key.id()) {
                    definition.set_shared(shared);
                }
            }
        }
    }
});
