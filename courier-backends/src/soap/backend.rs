use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    Backend, BackendError, BindError, Error, ProvidesServices, Result, ResultValidator,
    ServiceCache, ServiceMethod, Signature, TypeExpr, TypeInfo, TypeRole,
};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use super::fault::{BaseSoapFault, Fault};
use super::markers::OperationName;
use super::request::SoapRequest;

/// The service proxy does not know the requested operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid operation `{operation}`")]
pub struct InvalidOperation {
    pub operation: String,
}

/// Ways a SOAP operation can fail inside the service proxy.
#[derive(Debug, Error)]
pub enum SoapFailure {
    /// The service answered with a SOAP fault.
    #[error(transparent)]
    Fault(#[from] Fault),

    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    #[error(transparent)]
    Transport(anyhow::Error),

    #[error("operation cancelled")]
    Cancelled,
}

/// The proxy performing SOAP operations for a [`SoapBackend`].
#[async_trait]
pub trait SoapService: Send + Sync + 'static {
    async fn call(
        &self,
        operation: &str,
        payload: Value,
        soap_header: Option<Value>,
    ) -> Result<Value, SoapFailure>;
}

/// SOAP backend configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SoapBackendConfig {
    /// Per-operation timeout in milliseconds, unlimited when unset
    pub operation_timeout_ms: Option<u64>,
}

/// The raw response handed to response markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    pub operation_name: String,
}

/// Validators of one method's result, split by role.
#[derive(Debug)]
struct Outcomes {
    success: ResultValidator,
    fault: ResultValidator,
}

impl Outcomes {
    /// Declared faults, plus [`BaseSoapFault`] as the fallback, validate
    /// faults; every other arm validates successful payloads. With faults
    /// only, a successful payload must be empty.
    fn split(signature: &Signature) -> Result<Self, BindError> {
        let (faults, mut values): (Vec<&TypeInfo>, Vec<&TypeInfo>) = signature
            .return_type
            .arms()
            .into_iter()
            .partition(|arm| arm.role == TypeRole::Fault);

        let empty = TypeExpr::empty();
        if values.is_empty() {
            values = empty.arms();
        }

        let fallback = TypeExpr::fault::<BaseSoapFault>();
        let mut fault_arms = faults;
        fault_arms.extend(fallback.arms());

        Ok(Self {
            success: ResultValidator::from_arms(joined_names(&values), values)?,
            fault: ResultValidator::from_arms(joined_names(&fault_arms), fault_arms)?,
        })
    }
}

fn joined_names(arms: &[&TypeInfo]) -> String {
    arms.iter()
        .map(|arm| arm.name.as_ref())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Backend dispatching bound calls to a [`SoapService`].
///
/// Every method must be marked with an
/// [`operation_name`](super::operation_name). A fault comes back as the
/// call's value, validated against the declared fault types.
pub struct SoapBackend<S> {
    service: S,
    config: SoapBackendConfig,
    services: ServiceCache,
}

impl<S: SoapService> SoapBackend<S> {
    pub fn new(service: S) -> Self {
        Self::with_config(service, SoapBackendConfig::default())
    }

    pub fn with_config(service: S, config: SoapBackendConfig) -> Self {
        Self {
            service,
            config,
            services: ServiceCache::new(),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn config(&self) -> &SoapBackendConfig {
        &self.config
    }

    async fn dispatch(
        &self,
        signature: &Signature,
        outcomes: &Outcomes,
        request: SoapRequest,
    ) -> Result<Value> {
        let operation = request.get_operation_name()?;
        let payload = request.payload.clone().unwrap_or_else(|| json!({}));

        debug!(operation, method_name = %signature.method_name, "Calling SOAP operation");
        let call = self.service.call(operation, payload, request.soap_header.clone());
        let outcome = match self.config.operation_timeout_ms {
            Some(timeout_ms) => {
                match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
                    Ok(outcome) => outcome,
                    Err(elapsed) => return Err(Error::Backend(BackendError::new(elapsed))),
                }
            }
            None => call.await,
        };

        match outcome {
            Ok(payload) => {
                debug!(operation, "SOAP operation succeeded");
                let response = SoapResponse {
                    operation_name: operation.to_owned(),
                };
                signature.finalize_against(&response, payload, &outcomes.success)
            }
            Err(SoapFailure::Fault(fault)) => {
                debug!(operation, code = %fault.code, "SOAP operation returned a fault");
                Ok(outcomes.fault.validate(fault.to_payload())?)
            }
            Err(SoapFailure::UnknownOperation(operation)) => Err(Error::Backend(
                BackendError::new(InvalidOperation { operation }),
            )),
            Err(SoapFailure::Transport(err)) => Err(Error::from_anyhow(err)),
            Err(SoapFailure::Cancelled) => Err(Error::Cancelled),
        }
    }
}

impl<S> fmt::Debug for SoapBackend<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoapBackend")
            .field("service", &type_name::<S>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: SoapService> Backend for SoapBackend<S> {
    fn bind_method(signature: Arc<Signature>) -> Result<ServiceMethod, BindError> {
        if signature.method_marker::<OperationName>().is_none() {
            return Err(signature.missing_metadata("SOAP operation name"));
        }
        let outcomes = Arc::new(Outcomes::split(&signature)?);

        Ok(ServiceMethod::for_backend::<SoapBackend<S>, _, _>(
            move |backend, args| {
                let signature = Arc::clone(&signature);
                let outcomes = Arc::clone(&outcomes);
                async move {
                    let request: SoapRequest = signature.build_request(args)?;
                    backend.dispatch(&signature, &outcomes, request).await
                }
            },
        ))
    }
}

impl<S: SoapService> ProvidesServices for SoapBackend<S> {
    fn services(&self) -> &ServiceCache {
        &self.services
    }
}
