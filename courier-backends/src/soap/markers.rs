//! SOAP request markers.

use courier_core::{
    request_as, Annotation, BackendRequest, BoundArguments, MarkerError, MethodMarker,
    ParameterMarker,
};
use serde_json::Value;

use super::request::SoapRequest;

/// Names the operation a method calls. Required by [`SoapBackend`](super::SoapBackend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationName(pub String);

impl OperationName {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl MethodMarker for OperationName {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        _arguments: &BoundArguments,
    ) -> Result<(), MarkerError> {
        request_as::<SoapRequest>(request, "OperationName")?.operation_name = Some(self.0.clone());
        Ok(())
    }
}

pub fn operation_name(name: impl Into<String>) -> OperationName {
    OperationName(name.into())
}

/// Uses the argument as the whole request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Body;

impl ParameterMarker for Body {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        value: &Value,
    ) -> Result<(), MarkerError> {
        request_as::<SoapRequest>(request, "Body")?.payload = Some(value.clone());
        Ok(())
    }
}

/// Uses the argument as the SOAP header, merging objects into a header set
/// by an earlier parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoapHeader;

impl ParameterMarker for SoapHeader {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        value: &Value,
    ) -> Result<(), MarkerError> {
        let request = request_as::<SoapRequest>(request, "SoapHeader")?;
        let Some(existing) = request.soap_header.as_mut() else {
            request.soap_header = Some(value.clone());
            return Ok(());
        };
        match (existing, value) {
            (Value::Object(header), Value::Object(addition)) => {
                header.extend(addition.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(())
            }
            (existing, value) => Err(MarkerError::UnexpectedValue {
                marker: "SoapHeader",
                expected: "objects to merge into the header",
                found: format!("{value} into {existing}"),
            }),
        }
    }
}

impl From<Body> for Annotation {
    fn from(marker: Body) -> Self {
        Annotation::parameter(marker)
    }
}

impl From<SoapHeader> for Annotation {
    fn from(marker: SoapHeader) -> Self {
        Annotation::parameter(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{ArgumentBinder, CallArgs};
    use serde_json::json;

    #[test]
    fn test_operation_name() {
        let arguments = ArgumentBinder::new("call", &[]).bind(CallArgs::new()).unwrap();
        let mut request = SoapRequest::default();
        operation_name("NumberToWords")
            .prepare_request(&mut request, &arguments)
            .unwrap();
        assert_eq!(request.get_operation_name().unwrap(), "NumberToWords");
    }

    #[test]
    fn test_body_replaces_payload() {
        let mut request = SoapRequest::default();
        Body.prepare_request(&mut request, &json!({"a": 1})).unwrap();
        Body.prepare_request(&mut request, &json!({"b": 2})).unwrap();
        assert_eq!(request.payload, Some(json!({"b": 2})));
    }

    #[test]
    fn test_soap_header_merges() {
        let mut request = SoapRequest::default();
        SoapHeader
            .prepare_request(&mut request, &json!({"token": "t"}))
            .unwrap();
        SoapHeader
            .prepare_request(&mut request, &json!({"locale": "en"}))
            .unwrap();
        assert_eq!(request.soap_header, Some(json!({"token": "t", "locale": "en"})));

        let err = SoapHeader
            .prepare_request(&mut request, &json!("raw"))
            .unwrap_err();
        assert!(matches!(err, MarkerError::UnexpectedValue { marker: "SoapHeader", .. }));
    }
}
