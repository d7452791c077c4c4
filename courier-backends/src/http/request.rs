use courier_core::{Error, Result};
use indexmap::IndexMap;
use reqwest::Method;
use serde_json::Value;

/// An HTTP request under construction by the markers.
///
/// Values stay JSON until the request is sent; see [`render`] for how they
/// become strings.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Option<String>,
    pub url_path: Option<String>,
    pub headers: Vec<(String, Value)>,
    pub query_params: Vec<(String, Value)>,
    pub form_data: IndexMap<String, Vec<Value>>,
    /// JSON body.
    pub payload: Option<Value>,
}

impl HttpRequest {
    /// The validated request method.
    pub fn get_method(&self) -> Result<Method> {
        let method = self
            .method
            .as_deref()
            .ok_or_else(|| Error::InvalidRequest("an HTTP request requires a method".into()))?;
        Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::InvalidRequest(format!("invalid HTTP method `{method}`")))
    }

    /// The validated URL path.
    pub fn get_url_path(&self) -> Result<&str> {
        self.url_path
            .as_deref()
            .ok_or_else(|| Error::InvalidRequest("an HTTP request requires a URL path".into()))
    }

    pub fn header_pairs(&self) -> Vec<(&str, String)> {
        pairs(self.headers.iter().map(|(name, value)| (name.as_str(), value)))
    }

    pub fn query_pairs(&self) -> Vec<(&str, String)> {
        pairs(self.query_params.iter().map(|(name, value)| (name.as_str(), value)))
    }

    pub fn form_pairs(&self) -> Vec<(&str, String)> {
        pairs(
            self.form_data
                .iter()
                .flat_map(|(name, values)| values.iter().map(move |value| (name.as_str(), value))),
        )
    }
}

/// Flatten arrays into repeated pairs and drop `null`s.
fn pairs<'a>(entries: impl Iterator<Item = (&'a str, &'a Value)>) -> Vec<(&'a str, String)> {
    let mut rendered = Vec::new();
    for (name, value) in entries {
        match value {
            Value::Array(items) => {
                rendered.extend(items.iter().filter_map(render).map(|item| (name, item)))
            }
            other => rendered.extend(render(other).map(|item| (name, item))),
        }
    }
    rendered
}

/// Render a value for the wire: strings verbatim, `null` skipped, anything
/// else as its JSON text.
pub(crate) fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
