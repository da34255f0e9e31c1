//! Request extension trait for reading the resolved id in tonic handlers

use crate::accessor::get_id;
use crate::context::CallContext;
use crate::propagation::RequestIdPropagator;
use crate::request_id::RequestId;
use tonic::{Request, Status};

/// Access to the call context installed by [`RequestIdLayer`](crate::RequestIdLayer)
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_request_id::RequestIdExt;
/// use tonic::{Request, Response, Status};
///
/// async fn get_feed(request: Request<()>) -> Result<Response<()>, Status> {
///     let request_id = request.require_request_id()?;
///     tracing::info!(%request_id, "loading feed");
///     Ok(Response::new(()))
/// }
/// ```
pub trait RequestIdExt {
    /// Context installed by the layer, if any
    fn call_context(&self) -> Option<&CallContext>;

    /// Resolved id of this call
    ///
    /// `None` when the layer is not attached to the server.
    fn request_id(&self) -> Option<&RequestId>;

    /// Like [`request_id`](Self::request_id), failing with `Status::internal`
    /// when the layer is missing
    fn require_request_id(&self) -> Result<&RequestId, Status>;

    /// Client interceptor forwarding this call's metadata downstream
    fn propagator(&self) -> RequestIdPropagator;
}

impl<T> RequestIdExt for Request<T> {
    fn call_context(&self) -> Option<&CallContext> {
        self.extensions().get::<CallContext>()
    }

    fn request_id(&self) -> Option<&RequestId> {
        self.call_context().and_then(get_id)
    }

    fn require_request_id(&self) -> Result<&RequestId, Status> {
        self.request_id().ok_or_else(|| {
            Status::internal("Request ID not resolved. Ensure RequestIdLayer is attached.")
        })
    }

    fn propagator(&self) -> RequestIdPropagator {
        self.call_context()
            .map(RequestIdPropagator::from_context)
            .unwrap_or_default()
    }
}
