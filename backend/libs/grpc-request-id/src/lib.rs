//! Request ID Correlation for gRPC Microservices
//!
//! Every inbound gRPC call gets exactly one correlation id. It is either
//! taken from the caller's `x-request-id` metadata or freshly generated, and
//! it then follows the call everywhere:
//!
//! - into the call's logging scope as `reqId` (plus `trace_id`/`span_id`
//!   when the call belongs to a sampled trace)
//! - into the metadata seen by the handler and forwarded to downstream calls
//! - back to the caller as the `x-response-id` response header
//!
//! ## Core Components
//!
//! - **RequestIdResolver**: Decides the id and derives the call context
//! - **UnaryRequestIdInterceptor / StreamRequestIdInterceptor**: Run the
//!   resolver in front of unary and streaming handlers
//! - **RequestIdLayer**: Tower layer doing the same for a whole tonic server
//! - **RequestIdExt**: Request extension trait for handlers
//! - **RequestIdPropagator**: Client interceptor forwarding the id downstream
//! - **get_id**: Read the resolved id back from a context
//!
//! ## Usage Example
//!
//! ### Server Side
//!
//! ```rust,no_run
//! use grpc_request_id::{RequestIdExt, RequestIdLayer};
//! use tonic::{Request, Response, Status};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (_reporter, health_service) = tonic_health::server::health_reporter();
//!
//! tonic::transport::Server::builder()
//!     .layer(RequestIdLayer::new())
//!     .add_service(health_service)
//!     .serve("0.0.0.0:50051".parse()?)
//!     .await?;
//! # Ok(())
//! # }
//!
//! // In endpoint handler
//! async fn get_profile(request: Request<()>) -> Result<Response<()>, Status> {
//!     let request_id = request.require_request_id()?;
//!     tracing::info!(%request_id, "loading profile");
//!     Ok(Response::new(()))
//! }
//! ```
//!
//! ### Without Tower
//!
//! ```rust
//! use grpc_request_id::{get_id, resolve_id_interceptor_unary, CallContext};
//! use tonic::metadata::MetadataMap;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut metadata = MetadataMap::new();
//! metadata.insert("x-request-id", "444444".parse().unwrap());
//! let context = CallContext::new().with_incoming_metadata(metadata);
//!
//! let seen = resolve_id_interceptor_unary()
//!     .intercept(context, (), |ctx, _| async move { get_id(&ctx).cloned() })
//!     .await;
//!
//! assert_eq!(seen.unwrap().as_str(), "444444");
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - Resolution never fails a call
//! - Downstream metadata carries exactly one `x-request-id`
//! - Contexts are never mutated; resolution returns a derived copy
//! - Calls without inbound metadata pass through without an id

mod accessor;
mod context;
mod error;
mod extensions;
mod headers;
mod interceptor;
mod layer;
mod log_fields;
mod propagation;
mod request_id;
mod resolver;
mod stream;
mod trace;

pub use accessor::get_id;
pub use context::{CallContext, HeaderSender};
pub use error::SendHeaderError;
pub use extensions::RequestIdExt;
pub use headers::ResponseHeaders;
pub use interceptor::{
    resolve_id_interceptor_stream, resolve_id_interceptor_unary, StreamRequestIdInterceptor,
    UnaryRequestIdInterceptor,
};
pub use layer::{RequestIdLayer, RequestIdService};
pub use log_fields::{
    LogField, LogSink, TracingSink, REQUEST_ID_FIELD, SPAN_ID_FIELD, TRACE_ID_FIELD,
};
pub use propagation::RequestIdPropagator;
pub use request_id::{RequestId, REQUEST_ID_KEY, RESPONSE_ID_KEY};
pub use resolver::RequestIdResolver;
pub use stream::{ChannelServerStream, ContextStream, ServerStream};
pub use trace::{
    extract_from_metadata, extract_trace_context, NoTracing, OpenTelemetryReader, TraceReader,
};

// Re-export tonic Status for convenience
pub use tonic::Status;
