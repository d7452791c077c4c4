//! Binding an interface to a backend.
//!
//! A [`BoundClass`] holds one [`ServiceMethod`] per public interface method
//! and is synthesized once per (interface, backend type) pair. A
//! [`BoundService`] pairs it with a backend instance.

use std::any::{type_name, Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::args::CallArgs;
use crate::error::{BindError, Error, Result, ValidationError};
use crate::interface::{declaration, Interface};
use crate::signature::Signature;

/// The backend instance a service method is called on.
pub type Receiver = Arc<dyn Any + Send + Sync>;

/// Future returned by a service method.
pub type BoxedCall = BoxFuture<'static, Result<Value>>;

type MethodFn = dyn Fn(Receiver, CallArgs) -> BoxedCall + Send + Sync;

/// A generated callable: `(receiver, arguments) -> future of the result`.
#[derive(Clone)]
pub struct ServiceMethod(Arc<MethodFn>);

impl ServiceMethod {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Receiver, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        ServiceMethod(Arc::new(move |receiver: Receiver, args: CallArgs| -> BoxedCall {
            Box::pin(f(receiver, args))
        }))
    }

    /// A method that expects its receiver to be a `B`.
    pub fn for_backend<B, F, Fut>(f: F) -> Self
    where
        B: Send + Sync + 'static,
        F: Fn(Arc<B>, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        ServiceMethod(Arc::new(move |receiver: Receiver, args: CallArgs| -> BoxedCall {
            match receiver.downcast::<B>() {
                Ok(backend) => Box::pin(f(backend, args)),
                Err(_) => Box::pin(future::ready(Err(Error::Receiver {
                    expected: type_name::<B>(),
                }))),
            }
        }))
    }

    pub fn call(&self, receiver: Receiver, args: CallArgs) -> BoxedCall {
        (self.0)(receiver, args)
    }
}

impl fmt::Debug for ServiceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceMethod").finish_non_exhaustive()
    }
}

/// A transport that can implement interface methods.
pub trait Backend: Send + Sync + Sized + 'static {
    /// Produce the callable implementing `signature` for this backend type.
    fn bind_method(signature: Arc<Signature>) -> Result<ServiceMethod, BindError>;
}

#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub signature: Arc<Signature>,
    pub method: ServiceMethod,
}

/// The synthesized implementation of an interface for one backend type.
#[derive(Debug)]
pub struct BoundClass {
    pub name: String,
    pub doc: Option<String>,
    pub interface: TypeId,
    pub backend: &'static str,
    methods: IndexMap<String, BoundMethod>,
}

static CLASSES: LazyLock<DashMap<(TypeId, TypeId), Arc<BoundClass>>> =
    LazyLock::new(DashMap::new);

impl BoundClass {
    /// The cached class of `I` bound to `B`, synthesized on first use.
    pub fn of<I, B>() -> Result<Arc<BoundClass>, BindError>
    where
        I: Interface + ?Sized,
        B: Backend,
    {
        let key = (TypeId::of::<I>(), TypeId::of::<B>());
        if let Some(found) = CLASSES.get(&key) {
            return Ok(Arc::clone(found.value()));
        }
        // Backends may bind other interfaces while binding this one.
        let synthesized = Arc::new(Self::synthesize::<I, B>()?);
        let entry = CLASSES.entry(key).or_insert(synthesized);
        Ok(Arc::clone(entry.value()))
    }

    fn synthesize<I, B>() -> Result<BoundClass, BindError>
    where
        I: Interface + ?Sized,
        B: Backend,
    {
        let declaration = declaration::<I>();

        let mut seen = HashSet::new();
        for member in &declaration.methods {
            if !seen.insert(member.name.as_str()) {
                return Err(BindError::DuplicateMethod {
                    interface: declaration.name.clone(),
                    method: member.name.clone(),
                });
            }
        }

        let mut methods = IndexMap::new();
        for member in declaration.methods.iter().filter(|member| member.is_public()) {
            let signature = Signature::cached(&declaration, member)?;
            let method = B::bind_method(Arc::clone(&signature))?;
            // The first attached marker ends up outermost.
            let method = signature
                .method_markers
                .iter()
                .rev()
                .fold(method, |method, marker| marker.wrap(method));
            methods.insert(member.name.clone(), BoundMethod { signature, method });
        }

        debug!(
            "Synthesized {} for backend {} with {} methods",
            declaration.name,
            type_name::<B>(),
            methods.len()
        );

        Ok(BoundClass {
            name: declaration.name.clone(),
            doc: declaration.doc.clone(),
            interface: declaration.type_id,
            backend: type_name::<B>(),
            methods,
        })
    }

    pub fn method(&self, name: &str) -> Option<&BoundMethod> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Bind the interface `I` to `backend`.
pub fn bind<I, B>(backend: Arc<B>) -> Result<BoundService<I, B>, BindError>
where
    I: Interface + ?Sized,
    B: Backend,
{
    Ok(BoundService::from_parts(BoundClass::of::<I, B>()?, backend))
}

/// A backend-bound implementation of the interface `I`.
///
/// Implement the user-facing trait for `BoundService<dyn Trait, B>` by
/// delegating each method to [`BoundService::call`].
pub struct BoundService<I: ?Sized, B> {
    class: Arc<BoundClass>,
    backend: Arc<B>,
    _interface: PhantomData<fn() -> Box<I>>,
}

impl<I: ?Sized, B> Clone for BoundService<I, B> {
    fn clone(&self) -> Self {
        Self {
            class: Arc::clone(&self.class),
            backend: Arc::clone(&self.backend),
            _interface: PhantomData,
        }
    }
}

impl<I: ?Sized, B> fmt::Debug for BoundService<I, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundService")
            .field("interface", &self.class.name)
            .field("backend", &self.class.backend)
            .finish()
    }
}

impl<I: ?Sized, B: Backend> BoundService<I, B> {
    pub(crate) fn from_parts(class: Arc<BoundClass>, backend: Arc<B>) -> Self {
        Self {
            class,
            backend,
            _interface: PhantomData,
        }
    }

    pub fn class(&self) -> &Arc<BoundClass> {
        &self.class
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Call `method`, returning the finalized payload.
    pub fn invoke(&self, method: &str, args: CallArgs) -> BoxedCall {
        match self.class.method(method) {
            Some(bound) => {
                let receiver: Receiver = Arc::clone(&self.backend) as Receiver;
                bound.method.call(receiver, args)
            }
            None => Box::pin(future::ready(Err(Error::UnknownMethod {
                interface: self.class.name.clone(),
                method: method.to_owned(),
            }))),
        }
    }

    /// Call `method` and convert the result into `R`.
    pub async fn call<R: DeserializeOwned>(&self, method: &str, args: CallArgs) -> Result<R> {
        let value = self.invoke(method, args).await?;
        serde_json::from_value(value).map_err(|e| ValidationError::deserialize::<R>(&e).into())
    }
}
