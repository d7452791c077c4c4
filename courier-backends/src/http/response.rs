use reqwest::header::HeaderMap;
use reqwest::StatusCode;

/// The raw HTTP response handed to response markers.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, text: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            text: text.into(),
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Value of the header `name`, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    }
}
