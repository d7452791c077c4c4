//! Marker kinds and how they attach to a declaration.
//!
//! Method markers are registered per method in a [`MarkerTable`]. Parameter
//! and response markers travel inside type expressions as [`Annotation`]s.

mod method;
mod response;

pub use method::{wrap_with, MarkerTable, WrapWith};
pub use response::{Extract, Map, Mixin};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::args::BoundArguments;
use crate::binder::ServiceMethod;
use crate::error::MarkerError;
use crate::parts::{BackendRequest, BackendResponse};

/// Access to the concrete marker behind a trait object.
pub trait MarkerAny: Any {
    fn marker_any(&self) -> &dyn Any;
}

impl<T: Any> MarkerAny for T {
    fn marker_any(&self) -> &dyn Any {
        self
    }
}

/// Marker attached to a whole method.
///
/// It sees every bound argument at once and may also replace the generated
/// callable.
pub trait MethodMarker: MarkerAny + Send + Sync + fmt::Debug {
    fn prepare_request(
        &self,
        _request: &mut dyn BackendRequest,
        _arguments: &BoundArguments,
    ) -> Result<(), MarkerError> {
        Ok(())
    }

    fn wrap(&self, method: ServiceMethod) -> ServiceMethod {
        method
    }
}

/// Marker attached to one parameter, fed with that parameter's value.
pub trait ParameterMarker: MarkerAny + Send + Sync + fmt::Debug {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        value: &Value,
    ) -> Result<(), MarkerError>;
}

/// Marker that transforms or constructs a response payload.
pub trait ResponseMarker: MarkerAny + Send + Sync + fmt::Debug {
    fn apply(&self, response: &dyn BackendResponse, payload: Value) -> Result<Value, MarkerError>;
}

impl dyn MethodMarker {
    pub fn downcast_ref<M: MethodMarker>(&self) -> Option<&M> {
        self.marker_any().downcast_ref::<M>()
    }
}

impl dyn ParameterMarker {
    pub fn downcast_ref<M: ParameterMarker>(&self) -> Option<&M> {
        self.marker_any().downcast_ref::<M>()
    }
}

impl dyn ResponseMarker {
    pub fn downcast_ref<M: ResponseMarker>(&self) -> Option<&M> {
        self.marker_any().downcast_ref::<M>()
    }
}

/// A marker carried by a type expression.
#[derive(Clone)]
pub enum Annotation {
    Parameter(Arc<dyn ParameterMarker>),
    Response(Arc<dyn ResponseMarker>),
}

impl Annotation {
    pub fn parameter(marker: impl ParameterMarker) -> Self {
        Annotation::Parameter(Arc::new(marker))
    }

    pub fn response(marker: impl ResponseMarker) -> Self {
        Annotation::Response(Arc::new(marker))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Annotation::Parameter(_) => "parameter",
            Annotation::Response(_) => "response",
        }
    }
}

impl fmt::Debug for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Parameter(marker) => marker.fmt(f),
            Annotation::Response(marker) => marker.fmt(f),
        }
    }
}

/// Merge the keys of `addition` into `payload`.
///
/// Both sides must be JSON objects.
pub(crate) fn merge_object(
    marker: &'static str,
    payload: &mut Value,
    addition: Value,
) -> Result<(), MarkerError> {
    let Value::Object(addition) = addition else {
        return Err(MarkerError::UnexpectedValue {
            marker,
            expected: "an object to merge",
            found: addition.to_string(),
        });
    };
    match payload {
        Value::Object(target) => {
            target.extend(addition);
            Ok(())
        }
        Value::Null => {
            *payload = Value::Object(addition);
            Ok(())
        }
        other => Err(MarkerError::UnexpectedValue {
            marker,
            expected: "an object payload",
            found: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_downcast_response_marker() {
        let marker: Arc<dyn ResponseMarker> = Arc::new(Extract::new("body"));
        let extract = marker.downcast_ref::<Extract>().unwrap();
        assert_eq!(extract.key(), "body");
        assert!(marker.downcast_ref::<Map>().is_none());
    }

    #[test]
    fn test_annotation_kind() {
        assert_eq!(Annotation::from(Map::new("data")).kind(), "response");
    }

    #[test]
    fn test_merge_object() {
        let mut payload = json!({"a": 1});
        merge_object("Test", &mut payload, json!({"b": 2})).unwrap();
        assert_eq!(payload, json!({"a": 1, "b": 2}));

        let mut payload = Value::Null;
        merge_object("Test", &mut payload, json!({"b": 2})).unwrap();
        assert_eq!(payload, json!({"b": 2}));

        let mut payload = json!([1]);
        assert!(merge_object("Test", &mut payload, json!({"b": 2})).is_err());
        assert!(merge_object("Test", &mut json!({}), json!(3)).is_err());
    }
}
