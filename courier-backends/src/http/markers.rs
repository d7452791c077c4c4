//! HTTP request and response markers.
//!
//! Method markers: [`path`], [`path_with`] and [`http_method`].
//! Parameter markers: [`CustomHeader`], [`QueryParam`], [`Payload`],
//! [`Field`], [`FormData`] and [`FormField`].
//! Response markers: [`StatusCode`], [`ReasonPhrase`], [`Text`] and
//! [`Header`].

use std::fmt;
use std::sync::Arc;

use courier_core::{
    request_as, response_as, Annotation, BackendRequest, BackendResponse, BoundArguments,
    MarkerError, MethodMarker, ParameterMarker, ResponseMarker,
};
use serde_json::{json, Map as JsonMap, Value};

use super::request::HttpRequest;
use super::response::HttpResponse;

fn http_request<'r>(
    request: &'r mut dyn BackendRequest,
    marker: &'static str,
) -> Result<&'r mut HttpRequest, MarkerError> {
    request_as::<HttpRequest>(request, marker)
}

fn expect_object<'v>(
    marker: &'static str,
    value: &'v Value,
) -> Result<&'v JsonMap<String, Value>, MarkerError> {
    value.as_object().ok_or_else(|| MarkerError::UnexpectedValue {
        marker,
        expected: "an object",
        found: value.to_string(),
    })
}

type PathFactory = dyn Fn(&BoundArguments) -> String + Send + Sync;

#[derive(Clone)]
enum PathSource {
    Template(String),
    Factory(Arc<PathFactory>),
}

/// Sets the request URL path.
///
/// A template refers to arguments by name (`{id}`) or by the position of
/// the leading positional arguments (`{0}`); `{{` and `}}` stand for literal
/// braces.
#[derive(Clone)]
pub struct Path {
    source: PathSource,
}

impl Path {
    pub fn render(&self, arguments: &BoundArguments) -> Result<String, MarkerError> {
        match &self.source {
            PathSource::Template(template) => format_template(template, arguments),
            PathSource::Factory(factory) => Ok(factory(arguments)),
        }
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            PathSource::Template(template) => f.debug_tuple("Path").field(template).finish(),
            PathSource::Factory(_) => f.debug_tuple("Path").field(&"<factory>").finish(),
        }
    }
}

impl MethodMarker for Path {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        arguments: &BoundArguments,
    ) -> Result<(), MarkerError> {
        let url_path = self.render(arguments)?;
        http_request(request, "Path")?.url_path = Some(url_path);
        Ok(())
    }
}

/// URL path from a template.
pub fn path(template: impl Into<String>) -> Path {
    Path {
        source: PathSource::Template(template.into()),
    }
}

/// URL path computed from the call arguments.
pub fn path_with<F>(factory: F) -> Path
where
    F: Fn(&BoundArguments) -> String + Send + Sync + 'static,
{
    Path {
        source: PathSource::Factory(Arc::new(factory)),
    }
}

fn format_template(template: &str, arguments: &BoundArguments) -> Result<String, MarkerError> {
    let malformed = || MarkerError::MalformedTemplate {
        template: template.to_owned(),
    };

    let mut positional: Option<Vec<Value>> = None;
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '}' => return Err(malformed()),
            '{' => {
                let mut placeholder = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(malformed()),
                        Some(c) => placeholder.push(c),
                    }
                }

                let value = match placeholder.parse::<usize>() {
                    Ok(index) => positional
                        .get_or_insert_with(|| arguments.args())
                        .get(index)
                        .cloned(),
                    Err(_) => arguments.value(&placeholder),
                };
                let value = value.ok_or_else(|| MarkerError::UnknownPlaceholder {
                    template: template.to_owned(),
                    placeholder: placeholder.clone(),
                })?;
                match value {
                    Value::String(text) => output.push_str(&text),
                    other => output.push_str(&other.to_string()),
                }
            }
            c => output.push(c),
        }
    }
    Ok(output)
}

/// Sets the request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMethod(pub String);

impl MethodMarker for HttpMethod {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        _arguments: &BoundArguments,
    ) -> Result<(), MarkerError> {
        http_request(request, "HttpMethod")?.method = Some(self.0.clone());
        Ok(())
    }
}

pub fn http_method(method: impl Into<String>) -> HttpMethod {
    HttpMethod(method.into())
}

/// Appends the argument as a request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomHeader(pub String);

impl CustomHeader {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl ParameterMarker for CustomHeader {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        value: &Value,
    ) -> Result<(), MarkerError> {
        http_request(request, "CustomHeader")?
            .headers
            .push((self.0.clone(), value.clone()));
        Ok(())
    }
}

/// Appends the argument as a query parameter.
///
/// Arrays become repeated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam(pub String);

impl QueryParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl ParameterMarker for QueryParam {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        value: &Value,
    ) -> Result<(), MarkerError> {
        http_request(request, "QueryParam")?
            .query_params
            .push((self.0.clone(), value.clone()));
        Ok(())
    }
}

/// Merges an object argument into the JSON body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Payload {
    pub exclude_null: bool,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave out keys whose value is `null`.
    pub fn excluding_null() -> Self {
        Self { exclude_null: true }
    }
}

impl ParameterMarker for Payload {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        value: &Value,
    ) -> Result<(), MarkerError> {
        let object = expect_object("Payload", value)?;
        let entries = object
            .iter()
            .filter(|(_, value)| !(self.exclude_null && value.is_null()))
            .map(|(key, value)| (key.clone(), value.clone()));

        let request = http_request(request, "Payload")?;
        match request.payload.get_or_insert_with(|| json!({})) {
            Value::Object(payload) => {
                payload.extend(entries);
                Ok(())
            }
            other => Err(MarkerError::UnexpectedValue {
                marker: "Payload",
                expected: "an object body",
                found: other.to_string(),
            }),
        }
    }
}

/// Sets one field of the JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field(pub String);

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl ParameterMarker for Field {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        value: &Value,
    ) -> Result<(), MarkerError> {
        let request = http_request(request, "Field")?;
        match request.payload.get_or_insert_with(|| json!({})) {
            Value::Object(payload) => {
                payload.insert(self.0.clone(), value.clone());
                Ok(())
            }
            other => Err(MarkerError::UnexpectedValue {
                marker: "Field",
                expected: "an object body",
                found: other.to_string(),
            }),
        }
    }
}

/// Appends every key of an object argument to the form fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormData;

impl ParameterMarker for FormData {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        value: &Value,
    ) -> Result<(), MarkerError> {
        let object = expect_object("FormData", value)?;
        let request = http_request(request, "FormData")?;
        for (key, value) in object {
            request
                .form_data
                .entry(key.clone())
                .or_default()
                .push(value.clone());
        }
        Ok(())
    }
}

/// Appends the argument to one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField(pub String);

impl FormField {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl ParameterMarker for FormField {
    fn prepare_request(
        &self,
        request: &mut dyn BackendRequest,
        value: &Value,
    ) -> Result<(), MarkerError> {
        http_request(request, "FormField")?
            .form_data
            .entry(self.0.clone())
            .or_default()
            .push(value.clone());
        Ok(())
    }
}

fn http_response<'r>(
    response: &'r dyn BackendResponse,
    marker: &'static str,
) -> Result<&'r HttpResponse, MarkerError> {
    response_as::<HttpResponse>(response, marker)
}

fn single(key: &str, value: Value) -> Value {
    let mut object = JsonMap::with_capacity(1);
    object.insert(key.to_owned(), value);
    Value::Object(object)
}

/// Enriches the payload with the numeric status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCode {
    pub key: String,
}

impl StatusCode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::with_key("status_code")
    }
}

impl ResponseMarker for StatusCode {
    fn apply(&self, response: &dyn BackendResponse, _payload: Value) -> Result<Value, MarkerError> {
        let response = http_response(response, "StatusCode")?;
        Ok(single(&self.key, json!(response.status.as_u16())))
    }
}

/// Enriches the payload with the reason phrase of the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase {
    pub key: String,
}

impl ReasonPhrase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for ReasonPhrase {
    fn default() -> Self {
        Self::with_key("reason")
    }
}

impl ResponseMarker for ReasonPhrase {
    fn apply(&self, response: &dyn BackendResponse, _payload: Value) -> Result<Value, MarkerError> {
        let response = http_response(response, "ReasonPhrase")?;
        Ok(single(&self.key, json!(response.reason_phrase())))
    }
}

/// Enriches the payload with the raw response text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub key: String,
}

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for Text {
    fn default() -> Self {
        Self::with_key("text")
    }
}

impl ResponseMarker for Text {
    fn apply(&self, response: &dyn BackendResponse, _payload: Value) -> Result<Value, MarkerError> {
        let response = http_response(response, "Text")?;
        Ok(single(&self.key, json!(response.text)))
    }
}

/// Enriches the payload with one response header.
///
/// A missing header contributes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub header: String,
    pub key: String,
}

impl Header {
    pub fn new(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            key: key.into(),
        }
    }
}

impl ResponseMarker for Header {
    fn apply(&self, response: &dyn BackendResponse, _payload: Value) -> Result<Value, MarkerError> {
        let response = http_response(response, "Header")?;
        Ok(match response.header(&self.header) {
            Some(value) => single(&self.key, Value::String(value)),
            None => json!({}),
        })
    }
}

macro_rules! parameter_annotations {
    ($($marker:ty),+) => {
        $(
            impl From<$marker> for Annotation {
                fn from(marker: $marker) -> Self {
                    Annotation::parameter(marker)
                }
            }
        )+
    };
}

macro_rules! response_annotations {
    ($($marker:ty),+) => {
        $(
            impl From<$marker> for Annotation {
                fn from(marker: $marker) -> Self {
                    Annotation::response(marker)
                }
            }
        )+
    };
}

parameter_annotations!(CustomHeader, QueryParam, Payload, Field, FormData, FormField);
response_annotations!(StatusCode, ReasonPhrase, Text, Header);

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{ArgumentBinder, CallArgs, Param, TypeExpr};
    use reqwest::header::{HeaderMap, HeaderValue};

    fn arguments(call: CallArgs) -> BoundArguments {
        let params = [
            Param::new("user", TypeExpr::any()),
            Param::new("item", TypeExpr::any()),
            Param::new("verbose", TypeExpr::any()).default(false),
        ];
        let mut bound = ArgumentBinder::new("get", &params).bind(call).unwrap();
        bound.apply_defaults();
        bound
    }

    fn prepare(marker: &dyn ParameterMarker, value: Value) -> HttpRequest {
        let mut request = HttpRequest::default();
        marker.prepare_request(&mut request, &value).unwrap();
        request
    }

    #[test]
    fn test_path_template() {
        let arguments = arguments(CallArgs::new().arg("ann").kwarg("item", 7));
        let rendered = path("/users/{user}/items/{item}").render(&arguments).unwrap();
        assert_eq!(rendered, "/users/ann/items/7");

        let rendered = path("/{0}/{1}?verbose={verbose}").render(&arguments).unwrap();
        assert_eq!(rendered, "/ann/7?verbose=false");
    }

    #[test]
    fn test_path_template_escapes() {
        let arguments = arguments(CallArgs::new().arg("ann").arg(1));
        let rendered = path("/{{literal}}/{user}").render(&arguments).unwrap();
        assert_eq!(rendered, "/{literal}/ann");
    }

    #[test]
    fn test_path_template_errors() {
        let arguments = arguments(CallArgs::new().arg("ann").arg(1));
        assert!(matches!(
            path("/{missing}").render(&arguments),
            Err(MarkerError::UnknownPlaceholder { placeholder, .. }) if placeholder == "missing"
        ));
        assert!(matches!(
            path("/{5}").render(&arguments),
            Err(MarkerError::UnknownPlaceholder { .. })
        ));
        assert!(matches!(
            path("/{user").render(&arguments),
            Err(MarkerError::MalformedTemplate { .. })
        ));
        assert!(matches!(
            path("/user}").render(&arguments),
            Err(MarkerError::MalformedTemplate { .. })
        ));
    }

    #[test]
    fn test_path_factory() {
        let marker = path_with(|arguments| {
            format!("/users/{}", arguments.value("user").unwrap_or_default())
        });
        let arguments = arguments(CallArgs::new().arg(3).arg(1));

        let mut request = HttpRequest::default();
        marker.prepare_request(&mut request, &arguments).unwrap();
        assert_eq!(request.url_path.as_deref(), Some("/users/3"));
    }

    #[test]
    fn test_http_method() {
        let mut request = HttpRequest::default();
        let arguments = arguments(CallArgs::new().arg(1).arg(2));
        http_method("DELETE")
            .prepare_request(&mut request, &arguments)
            .unwrap();
        assert_eq!(request.method.as_deref(), Some("DELETE"));
    }

    #[test]
    fn test_header_and_query_append() {
        let mut request = HttpRequest::default();
        CustomHeader::new("x-trace")
            .prepare_request(&mut request, &json!("abc"))
            .unwrap();
        QueryParam::new("tag")
            .prepare_request(&mut request, &json!("a"))
            .unwrap();
        QueryParam::new("tag")
            .prepare_request(&mut request, &json!("b"))
            .unwrap();
        assert_eq!(request.headers, vec![("x-trace".to_string(), json!("abc"))]);
        assert_eq!(request.query_params.len(), 2);
    }

    #[test]
    fn test_payload_merges_objects() {
        let mut request = prepare(&Payload::new(), json!({"a": 1, "b": null}));
        Field::new("c").prepare_request(&mut request, &json!([1])).unwrap();
        assert_eq!(request.payload, Some(json!({"a": 1, "b": null, "c": [1]})));

        let request = prepare(&Payload::excluding_null(), json!({"a": 1, "b": null}));
        assert_eq!(request.payload, Some(json!({"a": 1})));
    }

    #[test]
    fn test_payload_rejects_non_objects() {
        let mut request = HttpRequest::default();
        let err = Payload::new()
            .prepare_request(&mut request, &json!([1, 2]))
            .unwrap_err();
        assert!(matches!(err, MarkerError::UnexpectedValue { marker: "Payload", .. }));

        request.payload = Some(json!("text"));
        let err = Field::new("a")
            .prepare_request(&mut request, &json!(1))
            .unwrap_err();
        assert!(matches!(err, MarkerError::UnexpectedValue { marker: "Field", .. }));
    }

    #[test]
    fn test_form_markers() {
        let mut request = prepare(&FormData, json!({"name": "ann", "tag": "a"}));
        FormField::new("tag")
            .prepare_request(&mut request, &json!("b"))
            .unwrap();
        assert_eq!(request.form_data["name"], vec![json!("ann")]);
        assert_eq!(request.form_data["tag"], vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_marker_on_foreign_request() {
        #[derive(Debug, Default)]
        struct Other;

        let err = QueryParam::new("q")
            .prepare_request(&mut Other, &json!(1))
            .unwrap_err();
        assert!(matches!(
            err,
            MarkerError::UnsupportedRequest { marker: "QueryParam", .. }
        ));
    }

    fn response() -> HttpResponse {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Length", HeaderValue::from_static("42"));
        HttpResponse::new(reqwest::StatusCode::NOT_FOUND, headers, "gone")
    }

    #[test]
    fn test_status_markers() {
        let response = response();
        assert_eq!(
            StatusCode::new().apply(&response, Value::Null).unwrap(),
            json!({"status_code": 404})
        );
        assert_eq!(
            StatusCode::with_key("code").apply(&response, Value::Null).unwrap(),
            json!({"code": 404})
        );
        assert_eq!(
            ReasonPhrase::new().apply(&response, Value::Null).unwrap(),
            json!({"reason": "Not Found"})
        );
        assert_eq!(
            Text::new().apply(&response, Value::Null).unwrap(),
            json!({"text": "gone"})
        );
    }

    #[test]
    fn test_header_marker() {
        let response = response();
        assert_eq!(
            Header::new("content-length", "size")
                .apply(&response, Value::Null)
                .unwrap(),
            json!({"size": "42"})
        );
        assert_eq!(
            Header::new("x-missing", "optional")
                .apply(&response, Value::Null)
                .unwrap(),
            json!({})
        );
    }
}
