use courier_core::{Error, Result};
use serde_json::Value;

/// A SOAP request under construction by the markers.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SoapRequest {
    pub operation_name: Option<String>,
    pub payload: Option<Value>,
    pub soap_header: Option<Value>,
}

impl SoapRequest {
    /// The validated, non-empty operation name.
    pub fn get_operation_name(&self) -> Result<&str> {
        match self.operation_name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(Error::InvalidRequest(
                "a SOAP request requires a non-empty operation name".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_name_is_required() {
        let mut request = SoapRequest::default();
        assert!(request.get_operation_name().is_err());

        request.operation_name = Some(String::new());
        assert!(request.get_operation_name().is_err());

        request.operation_name = Some("NumberToWords".into());
        assert_eq!(request.get_operation_name().unwrap(), "NumberToWords");
    }
}
