use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// A SOAP fault as reported by the service proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("SOAP fault `{code}`: {message}")]
pub struct Fault {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// The payload validated against the declared fault types.
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(detail) = &self.detail {
            payload["detail"] = detail.clone();
        }
        payload
    }
}

/// Fault every SOAP method may return, whatever it declares.
///
/// Declare service-specific faults with [`TypeExpr::fault`] and register
/// them as error responses deriving from this one:
///
/// ```ignore
/// courier_core::error_response!(QuotaExceeded: BaseSoapFault);
/// ```
///
/// [`TypeExpr::fault`]: courier_core::TypeExpr::fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BaseSoapFault {
    pub code: String,
    pub message: String,
}

courier_core::error_response!(BaseSoapFault);
