use std::sync::Arc;

use serde_json::{Map as JsonMap, Value};

use super::{merge_object, Annotation, ResponseMarker};
use crate::error::MarkerError;
use crate::parts::BackendResponse;

/// Map the payload into an object under the specified key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    key: String,
}

impl Map {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl ResponseMarker for Map {
    fn apply(&self, _response: &dyn BackendResponse, payload: Value) -> Result<Value, MarkerError> {
        let mut mapped = JsonMap::with_capacity(1);
        mapped.insert(self.key.clone(), payload);
        Ok(Value::Object(mapped))
    }
}

/// Extract the value stored under the specified key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extract {
    key: String,
}

impl Extract {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl ResponseMarker for Extract {
    fn apply(&self, _response: &dyn BackendResponse, payload: Value) -> Result<Value, MarkerError> {
        match payload {
            Value::Object(mut object) => {
                object
                    .remove(&self.key)
                    .ok_or_else(|| MarkerError::MissingKey {
                        key: self.key.clone(),
                    })
            }
            other => Err(MarkerError::UnexpectedValue {
                marker: "Extract",
                expected: "an object payload",
                found: other.to_string(),
            }),
        }
    }
}

/// Mix the outputs of the inner markers into the payload.
///
/// Inner markers run in order, each seeing the payload as updated by the
/// previous ones.
#[derive(Debug, Clone)]
pub struct Mixin {
    inner: Vec<Arc<dyn ResponseMarker>>,
}

impl Mixin {
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }

    pub fn with(mut self, marker: impl ResponseMarker) -> Self {
        self.inner.push(Arc::new(marker));
        self
    }

    pub fn inner(&self) -> &[Arc<dyn ResponseMarker>] {
        &self.inner
    }
}

impl Default for Mixin {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseMarker for Mixin {
    fn apply(&self, response: &dyn BackendResponse, payload: Value) -> Result<Value, MarkerError> {
        let mut payload = payload;
        for marker in &self.inner {
            let addition = marker.apply(response, payload.clone())?;
            merge_object("Mixin", &mut payload, addition)?;
        }
        Ok(payload)
    }
}

impl From<Map> for Annotation {
    fn from(marker: Map) -> Self {
        Annotation::response(marker)
    }
}

impl From<Extract> for Annotation {
    fn from(marker: Extract) -> Self {
        Annotation::response(marker)
    }
}

impl From<Mixin> for Annotation {
    fn from(marker: Mixin) -> Self {
        Annotation::response(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Status(u16);

    #[derive(Debug)]
    struct StatusMarker;

    impl ResponseMarker for StatusMarker {
        fn apply(&self, response: &dyn BackendResponse, _payload: Value) -> Result<Value, MarkerError> {
            let status = crate::parts::response_as::<Status>(response, "StatusMarker")?;
            Ok(json!({"status": status.0}))
        }
    }

    #[test]
    fn test_map() {
        let mapped = Map::new("data").apply(&(), json!([1, 2])).unwrap();
        assert_eq!(mapped, json!({"data": [1, 2]}));
    }

    #[test]
    fn test_extract() {
        let extracted = Extract::new("body")
            .apply(&(), json!({"body": {"name": "x"}, "other": 1}))
            .unwrap();
        assert_eq!(extracted, json!({"name": "x"}));
    }

    #[test]
    fn test_extract_missing_key() {
        let err = Extract::new("body").apply(&(), json!({"other": 1})).unwrap_err();
        assert_eq!(err, MarkerError::MissingKey { key: "body".into() });

        let err = Extract::new("body").apply(&(), json!(42)).unwrap_err();
        assert!(matches!(err, MarkerError::UnexpectedValue { marker: "Extract", .. }));
    }

    #[test]
    fn test_mixin() {
        let mixin = Mixin::new().with(StatusMarker).with(Map::new("wrapped"));
        let payload = mixin.apply(&Status(201), json!({"name": "x"})).unwrap();
        assert_eq!(
            payload,
            json!({
                "name": "x",
                "status": 201,
                "wrapped": {"name": "x", "status": 201}
            })
        );
    }

    #[test]
    fn test_mixin_wrong_response() {
        let err = Mixin::new()
            .with(StatusMarker)
            .apply(&(), json!({}))
            .unwrap_err();
        assert!(matches!(err, MarkerError::UnsupportedResponse { marker: "StatusMarker", .. }));
    }
}
