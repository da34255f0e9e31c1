//! Unary and streaming call interceptors
//!
//! Both adapters run the resolver, hand the derived context to the next
//! handler and run that handler inside the call's logging span. Neither
//! transforms the request or the handler's result.
//!
//! The `intercept_request` variants take tonic requests directly and, since
//! no tower layer will flush it for them, copy the queued `x-response-id`
//! into the response metadata they return.

use crate::context::CallContext;
use crate::resolver::RequestIdResolver;
use crate::stream::{ChannelServerStream, ContextStream, ServerStream};
use futures::Stream;
use std::future::Future;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::Instrument;

/// Interceptor for single-request / single-response calls
#[derive(Debug, Clone, Default)]
pub struct UnaryRequestIdInterceptor {
    resolver: RequestIdResolver,
}

impl UnaryRequestIdInterceptor {
    pub fn new(resolver: RequestIdResolver) -> Self {
        Self { resolver }
    }

    /// Resolve the id against `context` and call `handler` with the derived context
    pub async fn intercept<Req, H, Fut>(
        &self,
        context: CallContext,
        request: Req,
        handler: H,
    ) -> Fut::Output
    where
        H: FnOnce(CallContext, Req) -> Fut,
        Fut: Future,
    {
        let (_, context) = self.resolver.resolve(&context);
        let span = context.span();
        handler(context, request).instrument(span).await
    }

    /// Run a tonic unary handler behind the interceptor
    ///
    /// The derived context is also placed in the request extensions, so
    /// [`RequestIdExt`](crate::RequestIdExt) works inside the handler. The
    /// response id ends up in the metadata of the returned response or status.
    pub async fn intercept_request<Req, Res, H, Fut>(
        &self,
        request: Request<Req>,
        handler: H,
    ) -> Result<Response<Res>, Status>
    where
        H: FnOnce(CallContext, Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Res>, Status>>,
    {
        let context = CallContext::from_request(&request);
        let response_headers = context.response_headers().cloned();

        let mut result = self
            .intercept(context, request, |context, mut request| {
                request.extensions_mut().insert(context.clone());
                handler(context, request)
            })
            .await;

        if let Some(headers) = response_headers {
            match &mut result {
                Ok(response) => headers.flush_into_metadata(response.metadata_mut()),
                Err(status) => headers.flush_into_metadata(status.metadata_mut()),
            }
        }

        result
    }
}

/// Interceptor for streaming calls
#[derive(Debug, Clone, Default)]
pub struct StreamRequestIdInterceptor {
    resolver: RequestIdResolver,
}

impl StreamRequestIdInterceptor {
    pub fn new(resolver: RequestIdResolver) -> Self {
        Self { resolver }
    }

    /// Resolve the id against the stream's context and call `handler` with a
    /// wrapped stream whose `context()` returns the derived context
    pub async fn intercept<S, H, Fut>(&self, stream: S, handler: H) -> Fut::Output
    where
        S: ServerStream,
        H: FnOnce(ContextStream<S>) -> Fut,
        Fut: Future,
    {
        let (_, context) = self.resolver.resolve(stream.context());
        let span = context.span();
        handler(ContextStream::new(stream, context))
            .instrument(span)
            .await
    }

    /// Run a tonic streaming handler behind the interceptor
    ///
    /// Resolves before returning, so the response already carries
    /// `x-response-id` when tonic sends its head. The handler is spawned and
    /// feeds the returned response stream; it must be called from within a
    /// tokio runtime.
    pub fn intercept_request<I, O, St, H, Fut>(
        &self,
        request: Request<St>,
        buffer: usize,
        handler: H,
    ) -> Response<ReceiverStream<Result<O, Status>>>
    where
        I: Send + 'static,
        O: Send + 'static,
        St: Stream<Item = Result<I, Status>> + Send + 'static,
        H: FnOnce(ContextStream<ChannelServerStream<I, O>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stream, responses) = ChannelServerStream::from_request(request, buffer);
        let response_headers = stream.context().response_headers().cloned();

        let (_, context) = self.resolver.resolve(stream.context());
        let span = context.span();
        tokio::spawn(handler(ContextStream::new(stream, context)).instrument(span));

        let mut response = Response::new(responses);
        if let Some(headers) = response_headers {
            headers.flush_into_metadata(response.metadata_mut());
        }
        response
    }
}

/// Unary interceptor wired to `tracing` and OpenTelemetry
pub fn resolve_id_interceptor_unary() -> UnaryRequestIdInterceptor {
    UnaryRequestIdInterceptor::default()
}

/// Streaming interceptor wired to `tracing` and OpenTelemetry
pub fn resolve_id_interceptor_stream() -> StreamRequestIdInterceptor {
    StreamRequestIdInterceptor::default()
}
