//! Response finalization: markers, then validation against the result type.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::{Result, ValidationError};
use crate::markers::merge_object;
use crate::parts::BackendResponse;
use crate::signature::Signature;
use crate::validate::ResultValidator;

impl Signature {
    /// Apply the response markers to `payload` and validate the result.
    pub fn finalize(&self, response: &dyn BackendResponse, payload: Value) -> Result<Value> {
        self.finalize_against(response, payload, &self.result)
    }

    /// Same as [`Signature::finalize`] with a validator chosen by the backend.
    pub fn finalize_against(
        &self,
        response: &dyn BackendResponse,
        payload: Value,
        validator: &ResultValidator,
    ) -> Result<Value> {
        let payload = self.apply_response_markers(response, payload)?;
        trace!(
            method = %self.method_name,
            payload = %payload,
            "Validating payload against {}",
            validator.type_name()
        );
        Ok(validator.validate(payload)?)
    }

    /// Finalize and convert into `T`.
    pub fn finalize_as<T: DeserializeOwned>(
        &self,
        response: &dyn BackendResponse,
        payload: Value,
    ) -> Result<T> {
        let value = self.finalize(response, payload)?;
        serde_json::from_value(value).map_err(|e| ValidationError::deserialize::<T>(&e).into())
    }

    /// Run the response markers in order.
    ///
    /// Markers found on the return annotation replace the payload; markers
    /// found on model attributes merge their output into it.
    pub fn apply_response_markers(
        &self,
        response: &dyn BackendResponse,
        payload: Value,
    ) -> Result<Value> {
        let mut payload = payload;
        for descriptor in &self.response_descriptors {
            match &descriptor.attribute {
                None => payload = descriptor.marker.apply(response, payload)?,
                Some(_) => {
                    let addition = descriptor.marker.apply(response, payload.clone())?;
                    merge_object("attribute marker", &mut payload, addition)?;
                }
            }
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, MarkerError};
    use crate::interface::{Interface, InterfaceBuilder};
    use crate::markers::{Extract, Map, ResponseMarker};
    use crate::parts::response_as;
    use crate::types::{Attribute, TypeExpr};
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Model {
        name: String,
    }

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Tagged {
        name: String,
        status: u16,
    }

    #[derive(Debug)]
    struct Raw {
        status: u16,
    }

    #[derive(Debug)]
    struct Status;

    impl ResponseMarker for Status {
        fn apply(
            &self,
            response: &dyn BackendResponse,
            _payload: Value,
        ) -> std::result::Result<Value, MarkerError> {
            Ok(json!({"status": response_as::<Raw>(response, "Status")?.status}))
        }
    }

    impl From<Status> for crate::markers::Annotation {
        fn from(marker: Status) -> Self {
            crate::markers::Annotation::response(marker)
        }
    }

    trait Lookup {}

    impl Interface for dyn Lookup {
        fn declare(api: &mut InterfaceBuilder) {
            api.method("get", |m| {
                m.returns(TypeExpr::of::<Model>().annotate(Extract::new("body")));
            })
            .method("wrapped", |m| {
                m.returns(
                    TypeExpr::of::<Model>()
                        .annotate(Extract::new("data"))
                        .annotate(Map::new("name")),
                );
            })
            .method("tagged", |m| {
                m.returns(TypeExpr::model::<Tagged>([Attribute::new(
                    "status",
                    TypeExpr::of::<u16>().annotate(Status),
                )]));
            })
            .method("nothing", |_| {});
        }
    }

    #[test]
    fn test_finalize_extract() {
        let signature = Signature::of::<dyn Lookup>("get").unwrap();
        let model: Model = signature
            .finalize_as(&Raw { status: 200 }, json!({"body": {"name": "x"}}))
            .unwrap();
        assert_eq!(model, Model { name: "x".into() });
    }

    #[test]
    fn test_finalize_markers_in_order() {
        let signature = Signature::of::<dyn Lookup>("wrapped").unwrap();
        let value = signature
            .finalize(&Raw { status: 200 }, json!({"data": "y"}))
            .unwrap();
        assert_eq!(value, json!({"name": "y"}));
    }

    #[test]
    fn test_finalize_attribute_markers() {
        let signature = Signature::of::<dyn Lookup>("tagged").unwrap();
        let tagged: Tagged = signature
            .finalize_as(&Raw { status: 404 }, json!({"name": "z"}))
            .unwrap();
        assert_eq!(
            tagged,
            Tagged {
                name: "z".into(),
                status: 404
            }
        );
    }

    #[test]
    fn test_finalize_validation_error() {
        let signature = Signature::of::<dyn Lookup>("get").unwrap();
        let err = signature
            .finalize(&Raw { status: 200 }, json!({"body": {"title": "x"}}))
            .unwrap_err();
        match err {
            Error::Validation(err) => assert_eq!(err.type_name, "Model"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_finalize_marker_error() {
        let signature = Signature::of::<dyn Lookup>("get").unwrap();
        let err = signature
            .finalize(&Raw { status: 200 }, json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::Marker(MarkerError::MissingKey { .. })));
    }

    #[test]
    fn test_finalize_unit() {
        let signature = Signature::of::<dyn Lookup>("nothing").unwrap();
        let value = signature
            .finalize(&Raw { status: 204 }, json!({"ignored": true}))
            .unwrap();
        assert_eq!(value, Value::Null);
    }
}
