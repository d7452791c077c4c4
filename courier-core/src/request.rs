//! Request building: call arguments plus markers into a backend request.

use tracing::trace;

use crate::args::{Arg, CallArgs};
use crate::error::Result;
use crate::parts::BackendRequest;
use crate::signature::Signature;

impl Signature {
    /// Build a backend request of type `R` from the call arguments.
    ///
    /// Method markers run first, with every bound argument; parameter markers
    /// follow, each with its own parameter's value. Parameters that were not
    /// bound are skipped. Lazy values are produced once per call, before any
    /// marker runs.
    pub fn build_request<R>(&self, call: CallArgs) -> Result<R>
    where
        R: BackendRequest + Default,
    {
        let mut arguments = self.binder.bind(call)?;
        arguments.apply_defaults();
        arguments.resolve_lazy();

        let mut request = R::default();

        for marker in &self.method_markers {
            marker.prepare_request(&mut request, &arguments)?;
        }

        for descriptor in &self.parameter_descriptors {
            let Some(value) = arguments.get(&descriptor.name).and_then(Arg::as_value) else {
                continue;
            };
            descriptor.marker.prepare_request(&mut request, value)?;
        }

        trace!(
            method = %self.method_name,
            request = ?request,
            "Built request"
        );
        Ok(request)
    }
}
