//! Tower layer resolving request ids for a tonic server
//!
//! tonic routes unary and streaming calls through the same HTTP service, so
//! one layer covers both call shapes. The response id is written into the
//! response headers, which always reach the client before any message.

use crate::context::CallContext;
use crate::headers::ResponseHeaders;
use crate::resolver::RequestIdResolver;
use crate::trace::extract_trace_context;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tonic::metadata::MetadataMap;
use tower::{Layer, Service};
use tracing::Instrument;

/// Layer that attaches a correlation id to every call of a tonic server
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_request_id::RequestIdLayer;
/// use tonic::transport::Server;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (_reporter, health_service) = tonic_health::server::health_reporter();
///
/// Server::builder()
///     .layer(RequestIdLayer::new())
///     .add_service(health_service)
///     .serve("0.0.0.0:50051".parse()?)
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// Handlers read the id with [`RequestIdExt`](crate::RequestIdExt).
#[derive(Debug, Clone, Default)]
pub struct RequestIdLayer {
    resolver: RequestIdResolver,
}

impl RequestIdLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: RequestIdResolver) -> Self {
        Self { resolver }
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RequestIdService {
            inner: service,
            resolver: self.resolver.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
    resolver: RequestIdResolver,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for RequestIdService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<ReqBody>) -> Self::Future {
        let (mut parts, body) = request.into_parts();
        let response_headers = ResponseHeaders::new();

        let context = CallContext::new()
            .with_trace_context(extract_trace_context(&parts.headers))
            .with_response_headers(response_headers.clone())
            .with_incoming_metadata(MetadataMap::from_headers(parts.headers.clone()));

        let (_, context) = self.resolver.resolve(&context);

        // Handlers reading request metadata see the canonical id
        if let Some(metadata) = context.incoming_metadata() {
            parts.headers = metadata.clone().into_headers();
        }

        let span = context.span();
        parts.extensions.insert(context);
        let request = http::Request::from_parts(parts, body);

        // The clone may not be ready; keep the instance that was polled ready
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(request).instrument(span).await?;
            response_headers.flush_into(response.headers_mut());
            Ok(response)
        })
    }
}
