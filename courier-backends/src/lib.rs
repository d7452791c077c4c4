//! Transports for courier bound services.
//!
//! - [`http`]: requests over [`reqwest`], with path, method, header, query,
//!   body and form markers, plus response markers reading the status line
//!   and headers.
//! - [`soap`]: operations dispatched to a [`soap::SoapService`] proxy, with
//!   declared SOAP faults returned as values.

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "soap")]
pub mod soap;

#[cfg(feature = "http")]
pub use http::{HttpBackend, HttpBackendConfig, HttpRequest, HttpResponse};
#[cfg(feature = "soap")]
pub use soap::{SoapBackend, SoapBackendConfig, SoapRequest, SoapService};
