use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::MethodMarker;
use crate::binder::ServiceMethod;

/// Method markers of one interface, keyed by method name.
///
/// Populated while the interface is declared; a method's list is created
/// on first access and keeps the order in which markers were attached.
#[derive(Debug, Default, Clone)]
pub struct MarkerTable {
    methods: IndexMap<String, Vec<Arc<dyn MethodMarker>>>,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The marker list of `method`, created empty if missing.
    pub fn ensure(&mut self, method: &str) -> &mut Vec<Arc<dyn MethodMarker>> {
        self.methods.entry(method.to_owned()).or_default()
    }

    pub fn mark(&mut self, method: &str, marker: Arc<dyn MethodMarker>) {
        self.ensure(method).push(marker);
    }

    pub fn markers(&self, method: &str) -> &[Arc<dyn MethodMarker>] {
        self.methods.get(method).map(Vec::as_slice).unwrap_or(&[])
    }
}

type Decorator = dyn Fn(ServiceMethod) -> ServiceMethod + Send + Sync;

/// Wrap the generated callable with a decorator.
#[derive(Clone)]
pub struct WrapWith {
    decorator: Arc<Decorator>,
}

impl WrapWith {
    pub fn new<F>(decorator: F) -> Self
    where
        F: Fn(ServiceMethod) -> ServiceMethod + Send + Sync + 'static,
    {
        Self {
            decorator: Arc::new(decorator),
        }
    }
}

impl fmt::Debug for WrapWith {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapWith").finish_non_exhaustive()
    }
}

impl MethodMarker for WrapWith {
    fn wrap(&self, method: ServiceMethod) -> ServiceMethod {
        (self.decorator)(method)
    }
}

/// Shorthand for [`WrapWith::new`].
pub fn wrap_with<F>(decorator: F) -> WrapWith
where
    F: Fn(ServiceMethod) -> ServiceMethod + Send + Sync + 'static,
{
    WrapWith::new(decorator)
}
