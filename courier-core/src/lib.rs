//! Declarative service binding.
//!
//! An interface is declared once as a set of typed methods whose parameters,
//! return types and bodies carry markers. Binding it to a [`Backend`] yields a
//! [`BoundService`]: every call builds a backend request from the arguments,
//! lets the backend perform it, and finalizes the raw response into the
//! declared result type.

pub mod args;
pub mod binder;
pub mod container;
pub mod error;
pub mod interface;
pub mod logging;
pub mod markers;
pub mod parts;
pub mod request;
pub mod response;
pub mod signature;
pub mod transform;
pub mod types;
pub mod validate;

pub use args::{Arg, ArgumentBinder, BoundArguments, CallArgs, Param, ParamKind};
pub use binder::{bind, Backend, BoundClass, BoundMethod, BoundService, BoxedCall, Receiver, ServiceMethod};
pub use container::{ProvidesServices, ServiceCache};
pub use error::{
    AnnotationSite, ArgumentError, BackendError, BindError, BoxError, Cancelled, Error, MarkerError,
    Result, ValidationError, ValidationIssue,
};
pub use interface::{declaration, Declaration, Interface, InterfaceBuilder, MethodBuilder, MethodDecl};
pub use markers::{
    wrap_with, Annotation, Extract, Map, MarkerTable, MethodMarker, Mixin, ParameterMarker,
    ResponseMarker, WrapWith,
};
pub use parts::{request_as, response_as, BackendRequest, BackendResponse};
pub use response::{DerivedError, ErrorKind, ErrorResponse, ResponseModel, BASE_ERROR};
pub use signature::{MethodId, ParameterDescriptor, ResponseDescriptor, Signature};
pub use types::{Attribute, TypeExpr, TypeInfo, TypeRole, TypeScope};
pub use validate::{ResultValidator, Validator};

#[doc(hidden)]
pub use serde_json;

/// Build [`CallArgs`] from positional and keyword arguments.
///
/// ```ignore
/// args![];
/// args![42, "name"];
/// args![42; limit = 10, verbose = true];
/// args![; limit = 10];
/// ```
///
/// Values go through `serde_json::json!`.
#[macro_export]
macro_rules! args {
    () => {
        $crate::args::CallArgs::new()
    };
    ($($pos:expr),* ; $($name:ident = $value:expr),* $(,)?) => {
        $crate::args::CallArgs::new()
            $(.arg($crate::serde_json::json!($pos)))*
            $(.kwarg(stringify!($name), $crate::serde_json::json!($value)))*
    };
    ($($pos:expr),+ $(,)?) => {
        $crate::args::CallArgs::new()
            $(.arg($crate::serde_json::json!($pos)))+
    };
}
