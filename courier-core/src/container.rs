//! Per-backend cache of bound services.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::binder::{Backend, BoundClass, BoundService};
use crate::error::BindError;
use crate::interface::Interface;

/// Bound services of one backend instance, keyed by interface.
///
/// Entries hold the synthesized class only; the backend is attached again on
/// every lookup, so a backend can own its cache without a reference cycle.
#[derive(Debug, Default)]
pub struct ServiceCache {
    services: DashMap<TypeId, Arc<BoundClass>>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The service for `I`, binding it on first access.
    pub fn get_or_bind<I, B>(&self, backend: &Arc<B>) -> Result<BoundService<I, B>, BindError>
    where
        I: Interface + ?Sized,
        B: Backend,
    {
        let key = TypeId::of::<I>();
        if let Some(class) = self.services.get(&key) {
            return Ok(BoundService::from_parts(Arc::clone(class.value()), Arc::clone(backend)));
        }
        let class = BoundClass::of::<I, B>()?;
        self.services.insert(key, Arc::clone(&class));
        trace!("Cached service {} for {}", class.name, class.backend);
        Ok(BoundService::from_parts(class, Arc::clone(backend)))
    }

    pub fn contains<I: Interface + ?Sized>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<I>())
    }

    /// Forget the service for `I`; returns whether it was cached.
    pub fn remove<I: Interface + ?Sized>(&self) -> bool {
        self.services.remove(&TypeId::of::<I>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn clear(&self) {
        self.services.clear();
    }
}

/// A backend that hands out bound services through its own cache.
pub trait ProvidesServices: Backend {
    fn services(&self) -> &ServiceCache;

    fn service<I: Interface + ?Sized>(self: &Arc<Self>) -> Result<BoundService<I, Self>, BindError> {
        self.services().get_or_bind::<I, Self>(self)
    }

    /// Drop the cached service for `I`. Releasing twice is harmless.
    fn release<I: Interface + ?Sized>(&self) -> bool {
        self.services().remove::<I>()
    }
}
