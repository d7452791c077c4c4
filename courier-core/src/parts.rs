//! Seams between markers and backend-native request/response types.
//!
//! The engine never inspects a request or a raw response itself. Markers that
//! only make sense for one backend downcast to that backend's concrete type.

use std::any::{type_name, Any};
use std::fmt;

use crate::error::MarkerError;

/// A backend-native request under construction.
///
/// Implemented for every `Any + Send + Debug` type; backends pick a
/// `Default`-constructible struct and markers downcast to it.
pub trait BackendRequest: Any + Send + fmt::Debug {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Send + fmt::Debug> BackendRequest for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A raw backend response, as seen by response markers.
pub trait BackendResponse: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> BackendResponse for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcast the in-progress request to the type a marker supports.
pub fn request_as<'r, R: Any>(
    request: &'r mut dyn BackendRequest,
    marker: &'static str,
) -> Result<&'r mut R, MarkerError> {
    request
        .as_any_mut()
        .downcast_mut::<R>()
        .ok_or(MarkerError::UnsupportedRequest {
            marker,
            expected: type_name::<R>(),
        })
}

/// Downcast the raw response to the type a marker supports.
pub fn response_as<'r, R: Any>(
    response: &'r dyn BackendResponse,
    marker: &'static str,
) -> Result<&'r R, MarkerError> {
    response
        .as_any()
        .downcast_ref::<R>()
        .ok_or(MarkerError::UnsupportedResponse {
            marker,
            expected: type_name::<R>(),
        })
}
