//! HTTP backend over `reqwest`.

mod backend;
pub mod markers;
mod request;
mod response;

pub use backend::{HttpBackend, HttpBackendConfig};
pub use markers::{
    http_method, path, path_with, CustomHeader, Field, FormData, FormField, Header, HttpMethod,
    Path, Payload, QueryParam, ReasonPhrase, StatusCode, Text,
};
pub use request::HttpRequest;
pub use response::HttpResponse;
