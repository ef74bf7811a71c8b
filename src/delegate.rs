//! Fallback resolution sources
//!
//! Delegates are consulted in registration order after definitions and
//! providers miss. The first delegate whose `has` answers true supplies the
//! value, which the container returns untouched.

use crate::class::Args;
use crate::container::WeakContainer;
use crate::provider::AsAny;
use crate::{Container, DiError, Instance, Result};
use std::sync::{PoisonError, RwLock};

#[cfg(feature = "logging")]
use tracing::trace;

/// An independent resolution source.
pub trait Delegate: AsAny {
    fn has(&self, id: &str) -> bool;

    fn get(&self, id: &str) -> Result<Instance>;

    /// Named operation exposed through [`Container::invoke`]
    fn call(&self, method: &str, args: &Args) -> Result<Option<Instance>> {
        let _ = args;
        Err(DiError::method_not_found(self.type_name(), method))
    }

    /// The back-reference view, for delegates that need the container
    fn container_aware(&self) -> Option<&dyn ContainerAware> {
        None
    }
}

/// Receives a back-reference to the container it is attached to.
pub trait ContainerAware {
    fn set_container(&self, container: &Container);
}

/// Weak back-reference storage for [`ContainerAware`] implementors.
///
/// The slot never keeps the container alive.
#[derive(Default)]
pub struct ContainerSlot {
    container: RwLock<Option<WeakContainer>>,
}

impl ContainerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, container: &Container) {
        #[cfg(feature = "logging")]
        trace!(target: "keyed_injector", "Attaching container back-reference");

        *self
            .container
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(container.downgrade());
    }

    /// The attached container, if it is still alive
    pub fn get(&self) -> Result<Container> {
        self.container
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(WeakContainer::upgrade)
            .ok_or(DiError::NoContainer)
    }

    pub fn is_attached(&self) -> bool {
        self.get().is_ok()
    }
}

impl std::fmt::Debug for ContainerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}
