use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use courier_core::{
    Backend, BackendError, BindError, Error, ProvidesServices, Result, ServiceCache,
    ServiceMethod, Signature,
};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::request::HttpRequest;
use super::response::HttpResponse;

/// HTTP backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    /// Base URL the request paths are appended to
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Fail calls whose response status is not a success
    pub raise_for_status: bool,
    pub user_agent: Option<String>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 30000,
            raise_for_status: true,
            user_agent: Some(concat!("courier/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

/// Backend sending bound calls over HTTP.
#[derive(Debug)]
pub struct HttpBackend {
    config: HttpBackendConfig,
    client: Client,
    services: ServiceCache,
}

impl HttpBackend {
    /// Create a backend with its own client
    pub fn new(config: HttpBackendConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_millis(config.timeout_ms));
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, config))
    }

    /// Create a backend with the default configuration
    pub fn new_with_url(base_url: &str) -> anyhow::Result<Self> {
        let config = HttpBackendConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        };
        Self::new(config)
    }

    /// Create a backend around an existing client; `timeout_ms` and
    /// `user_agent` are left to the client.
    pub fn with_client(client: Client, config: HttpBackendConfig) -> Self {
        Self {
            config,
            client,
            services: ServiceCache::new(),
        }
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn url(&self, url_path: &str) -> Result<Url> {
        let joined = if url_path.contains("://") {
            url_path.to_owned()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                url_path.trim_start_matches('/')
            )
        };
        Url::parse(&joined).map_err(|err| Error::InvalidRequest(format!("invalid URL `{joined}`: {err}")))
    }

    async fn send(&self, signature: &Signature, request: HttpRequest) -> Result<Value> {
        let method = request.get_method()?;
        let url = self.url(request.get_url_path()?)?;

        let mut builder = self.client.request(method.clone(), url.clone());
        let query = request.query_pairs();
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        for (name, value) in request.header_pairs() {
            builder = builder.header(name, value);
        }
        match (&request.payload, request.form_data.is_empty()) {
            (Some(_), false) => {
                return Err(Error::InvalidRequest(
                    "an HTTP request cannot carry both a JSON body and form fields".into(),
                ))
            }
            (Some(payload), true) => builder = builder.json(payload),
            (None, false) => builder = builder.form(&request.form_pairs()),
            (None, true) => {}
        }

        debug!(%method, %url, method_name = %signature.method_name, "Sending HTTP request");
        let response = BackendError::guard(builder.send().await)?;
        if self.config.raise_for_status {
            BackendError::guard(response.error_for_status_ref().map(|_| ()))?;
        }

        let status = response.status();
        let headers = response.headers().clone();
        let text = BackendError::guard(response.text().await)?;
        debug!(status = status.as_u16(), bytes = text.len(), "Received HTTP response");

        let payload = if text.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(&text) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(%url, "Response body is not JSON, using an empty object: {}", err);
                    json!({})
                }
            }
        };

        signature.finalize(&HttpResponse::new(status, headers, text), payload)
    }
}

impl Backend for HttpBackend {
    fn bind_method(signature: Arc<Signature>) -> Result<ServiceMethod, BindError> {
        Ok(ServiceMethod::for_backend::<HttpBackend, _, _>(
            move |backend, args| {
                let signature = Arc::clone(&signature);
                async move {
                    let request: HttpRequest = signature.build_request(args)?;
                    backend.send(&signature, request).await
                }
            },
        ))
    }
}

impl ProvidesServices for HttpBackend {
    fn services(&self) -> &ServiceCache {
        &self.services
    }
}
