//! Server stream abstraction and its context-overriding wrapper

use crate::context::CallContext;
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

/// A server-side stream as seen by a streaming handler
///
/// In the streaming case the handler obtains its context from the stream
/// rather than as a parameter, which is why the interceptor has to wrap it.
#[async_trait]
pub trait ServerStream: Send {
    type Inbound: Send;
    type Outbound: Send;

    /// Context of the call this stream belongs to
    fn context(&self) -> &CallContext;

    async fn send_message(&mut self, message: Self::Outbound) -> Result<(), Status>;

    /// Next inbound message; `Ok(None)` once the client half-closed
    async fn recv_message(&mut self) -> Result<Option<Self::Inbound>, Status>;

    /// Close the outbound half; later sends fail
    async fn close(&mut self) -> Result<(), Status>;
}

/// Stream view whose `context()` returns a replacement context
///
/// Every other operation is forwarded to the wrapped stream untouched.
pub struct ContextStream<S> {
    inner: S,
    context: CallContext,
}

impl<S> ContextStream<S> {
    pub fn new(inner: S, context: CallContext) -> Self {
        Self { inner, context }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: ServerStream> ServerStream for ContextStream<S> {
    type Inbound = S::Inbound;
    type Outbound = S::Outbound;

    fn context(&self) -> &CallContext {
        &self.context
    }

    async fn send_message(&mut self, message: Self::Outbound) -> Result<(), Status> {
        self.inner.send_message(message).await
    }

    async fn recv_message(&mut self) -> Result<Option<Self::Inbound>, Status> {
        self.inner.recv_message().await
    }

    async fn close(&mut self) -> Result<(), Status> {
        self.inner.close().await
    }
}

/// `ServerStream` over a tonic inbound stream and an mpsc response channel
///
/// Lets a tonic streaming handler run behind the streaming interceptor:
///
/// ```rust,no_run
/// use grpc_request_id::{resolve_id_interceptor_stream, ServerStream};
/// use tokio_stream::wrappers::ReceiverStream;
/// use tonic::{Request, Response, Status, Streaming};
///
/// async fn echo(
///     request: Request<Streaming<String>>,
/// ) -> Result<Response<ReceiverStream<Result<String, Status>>>, Status> {
///     let response = resolve_id_interceptor_stream().intercept_request(
///         request,
///         16,
///         |mut stream| async move {
///             while let Ok(Some(message)) = stream.recv_message().await {
///                 if stream.send_message(message).await.is_err() {
///                     break;
///                 }
///             }
///         },
///     );
///
///     Ok(response)
/// }
/// ```
pub struct ChannelServerStream<I, O> {
    context: CallContext,
    inbound: BoxStream<'static, Result<I, Status>>,
    outbound: Option<mpsc::Sender<Result<O, Status>>>,
}

impl<I, O> ChannelServerStream<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Returns the stream together with the response side to hand back to tonic
    pub fn new<St>(
        context: CallContext,
        inbound: St,
        buffer: usize,
    ) -> (Self, ReceiverStream<Result<O, Status>>)
    where
        St: Stream<Item = Result<I, Status>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer);
        let stream = Self {
            context,
            inbound: inbound.boxed(),
            outbound: Some(tx),
        };
        (stream, ReceiverStream::new(rx))
    }

    /// Build from a tonic request carrying the inbound message stream,
    /// usually `Request<Streaming<I>>`
    pub fn from_request<St>(
        request: tonic::Request<St>,
        buffer: usize,
    ) -> (Self, ReceiverStream<Result<O, Status>>)
    where
        St: Stream<Item = Result<I, Status>> + Send + 'static,
    {
        let context = CallContext::from_request(&request);
        Self::new(context, request.into_inner(), buffer)
    }
}

#[async_trait]
impl<I, O> ServerStream for ChannelServerStream<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Inbound = I;
    type Outbound = O;

    fn context(&self) -> &CallContext {
        &self.context
    }

    async fn send_message(&mut self, message: O) -> Result<(), Status> {
        match &self.outbound {
            Some(tx) => tx
                .send(Ok(message))
                .await
                .map_err(|_| Status::cancelled("response stream dropped by client")),
            None => Err(Status::failed_precondition("response stream already closed")),
        }
    }

    async fn recv_message(&mut self) -> Result<Option<I>, Status> {
        self.inbound.next().await.transpose()
    }

    async fn close(&mut self) -> Result<(), Status> {
        self.outbound.take();
        Ok(())
    }
}
