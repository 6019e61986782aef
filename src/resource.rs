//! Explicit ownership of externally managed resources.
//!
//! Tree leaves may reference objects owned outside the engine (native geometry,
//! kernel-side variables). Rearranging a tree never frees them; only an Output
//! that produced new data releases its handles, and each handle releases its
//! resource at most once no matter how many trees share it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An externally owned object referenced from tree values.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Short type label used in logs and `Value` display.
    fn kind(&self) -> &str;

    /// Free the underlying object. Called at most once per handle.
    fn release(&self);
}

struct HandleInner {
    resource: Box<dyn Resource>,
    released: AtomicBool,
}

/// Shared, cheaply clonable reference to a [`Resource`].
///
/// Clones point at the same resource; equality is identity.
#[derive(Clone)]
pub struct ResourceHandle {
    inner: Arc<HandleInner>,
}

impl ResourceHandle {
    pub fn new(resource: impl Resource + 'static) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                resource: Box::new(resource),
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn kind(&self) -> &str {
        self.inner.resource.kind()
    }

    /// Release the resource. Returns `true` only for the call that actually released it.
    pub fn release(&self) -> bool {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::trace!("Releasing {} resource", self.kind());
        self.inner.resource.release();
        true
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("kind", &self.kind())
            .field("released", &self.is_released())
            .finish()
    }
}
