//! Successful and error response models.
//!
//! Error responses are plain values. Each error response type gets an
//! [`ErrorKind`], derived once from its parents' kinds and any extra bases,
//! and turns into a [`DerivedError`] on `raise_for_result()` or `unwrap()`.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::ptr;
use std::sync::Arc;

/// The kind of a derived error, forming a hierarchy through `bases`.
#[derive(Debug)]
pub struct ErrorKind {
    name: Cow<'static, str>,
    qualname: Cow<'static, str>,
    bases: Vec<&'static ErrorKind>,
}

/// Root of every derived error kind.
pub static BASE_ERROR: ErrorKind = ErrorKind::root("BaseError");

impl ErrorKind {
    /// A kind without bases, usable in a `static`.
    pub const fn root(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            qualname: Cow::Borrowed(name),
            bases: Vec::new(),
        }
    }

    /// Derive the kind of the error response `type_name`.
    ///
    /// With neither parents nor extra bases the kind derives from
    /// [`BASE_ERROR`].
    pub fn derive(
        module: &str,
        type_name: &str,
        parents: &[&'static ErrorKind],
        extra: &[&'static ErrorKind],
    ) -> Self {
        let mut bases: Vec<&'static ErrorKind> = parents.iter().chain(extra).copied().collect();
        if bases.is_empty() {
            bases.push(&BASE_ERROR);
        }
        Self {
            name: Cow::Owned(format!("{type_name}.Error")),
            qualname: Cow::Owned(format!("{module}::{type_name}.Error")),
            bases,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    pub fn bases(&self) -> &[&'static ErrorKind] {
        &self.bases
    }

    /// Whether `self` is `other` or derives from it.
    pub fn is_a(&self, other: &ErrorKind) -> bool {
        ptr::eq(self, other) || self.bases.iter().any(|base| base.is_a(other))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualname)
    }
}

/// A service response that may represent a failure.
pub trait ResponseModel: Sized {
    fn raise_for_result(&self) -> Result<(), DerivedError>;

    /// The response itself when successful, the derived error otherwise.
    fn unwrap(self) -> Result<Self, DerivedError> {
        self.raise_for_result()?;
        Ok(self)
    }

    /// Like `raise_for_result`, with `custom` chained on top of the derived
    /// error.
    fn raise_for_result_with<C>(&self, custom: C) -> Result<(), anyhow::Error>
    where
        C: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.raise_for_result()
            .map_err(|derived| anyhow::Error::new(derived).context(custom))
    }
}

/// An error response type with a derived error kind.
///
/// Implemented through [`error_response!`](crate::error_response).
pub trait ErrorResponse: ResponseModel + Clone + fmt::Debug + Send + Sync + 'static {
    fn error_kind() -> &'static ErrorKind;

    fn as_error(&self) -> DerivedError {
        DerivedError::new(Self::error_kind(), self.clone())
    }
}

trait Payload: Any + fmt::Debug + Send + Sync {
    fn payload_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> Payload for T {
    fn payload_any(&self) -> &dyn Any {
        self
    }
}

/// The error raised for an error response, carrying the response.
#[derive(Clone)]
pub struct DerivedError {
    kind: &'static ErrorKind,
    response: Arc<dyn Payload>,
}

impl DerivedError {
    pub fn new<T>(kind: &'static ErrorKind, response: T) -> Self
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        Self {
            kind,
            response: Arc::new(response),
        }
    }

    pub fn kind(&self) -> &'static ErrorKind {
        self.kind
    }

    /// The response this error was raised for, if it is a `T`.
    pub fn response<T: Any>(&self) -> Option<&T> {
        // Deref past the `Arc`, which is itself a `Payload`.
        (*self.response).payload_any().downcast_ref::<T>()
    }

    /// Whether this error's kind is, or derives from, the kind of `T`.
    pub fn is<T: ErrorResponse>(&self) -> bool {
        self.kind.is_a(T::error_kind())
    }

    pub fn is_kind(&self, kind: &ErrorKind) -> bool {
        self.kind.is_a(kind)
    }
}

impl fmt::Debug for DerivedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedError")
            .field("kind", &self.kind.qualname)
            .field("response", &self.response)
            .finish()
    }
}

impl fmt::Display for DerivedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.kind.name, self.response)
    }
}

impl std::error::Error for DerivedError {}

/// Register successful response types: `raise_for_result` is a no-op.
#[macro_export]
macro_rules! successful_response {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::response::ResponseModel for $ty {
                fn raise_for_result(&self) -> ::std::result::Result<(), $crate::response::DerivedError> {
                    ::std::result::Result::Ok(())
                }
            }
        )+
    };
}

/// Register an error response type.
///
/// ```ignore
/// error_response!(NotFound);
/// error_response!(Gone: NotFound);
/// error_response!(Teapot: NotFound; bases = [&PROTOCOL_ERROR]);
/// ```
///
/// The error kind is derived on first use from the parents' kinds and the
/// extra bases.
#[macro_export]
macro_rules! error_response {
    ($ty:ident $(: $($parent:ty),+)? $(; bases = [$($base:expr),* $(,)?])?) => {
        impl $crate::response::ErrorResponse for $ty {
            fn error_kind() -> &'static $crate::response::ErrorKind {
                static KIND: ::std::sync::OnceLock<$crate::response::ErrorKind> =
                    ::std::sync::OnceLock::new();
                KIND.get_or_init(|| {
                    $crate::response::ErrorKind::derive(
                        module_path!(),
                        stringify!($ty),
                        &[$($(<$parent as $crate::response::ErrorResponse>::error_kind()),+)?],
                        &[$($($base),*)?],
                    )
                })
            }
        }

        impl $crate::response::ResponseModel for $ty {
            fn raise_for_result(&self) -> ::std::result::Result<(), $crate::response::DerivedError> {
                ::std::result::Result::Err($crate::response::ErrorResponse::as_error(self))
            }
        }
    };
}
