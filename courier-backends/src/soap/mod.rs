//! SOAP backend over a service proxy.
//!
//! The backend does not speak SOAP itself: a [`SoapService`] implementation
//! (a WSDL-generated client, a test double) performs the operation and
//! reports faults as [`Fault`] values.

mod backend;
mod fault;
pub mod markers;
mod request;

pub use backend::{InvalidOperation, SoapBackend, SoapBackendConfig, SoapFailure, SoapResponse, SoapService};
pub use fault::{BaseSoapFault, Fault};
pub use markers::{operation_name, Body, OperationName, SoapHeader};
pub use request::SoapRequest;
