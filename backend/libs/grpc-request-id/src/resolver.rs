//! Identifier resolution
//!
//! The resolver decides the effective correlation id of a call and derives
//! the context every later stage of the call works with.

use crate::accessor::RequestIdSlot;
use crate::context::CallContext;
use crate::log_fields::{
    LogField, LogSink, TracingSink, REQUEST_ID_FIELD, SPAN_ID_FIELD, TRACE_ID_FIELD,
};
use crate::request_id::{RequestId, REQUEST_ID_KEY, RESPONSE_ID_KEY};
use crate::trace::{OpenTelemetryReader, TraceReader};
use std::fmt;
use std::sync::Arc;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};

/// Resolves the correlation id of inbound calls
///
/// This resolver:
/// 1. Reads the first `x-request-id` value from inbound metadata
/// 2. Reuses it when non-blank after trimming, otherwise generates a UUID v4
/// 3. Rewrites the metadata copy so downstream calls see exactly one id
/// 4. Attaches `reqId` (plus `trace_id`/`span_id` when sampled) to the logging scope
/// 5. Stores the id in a private context slot for [`get_id`](crate::get_id)
/// 6. Queues `x-response-id` for the original caller
///
/// Resolution never fails. A context without inbound metadata is passed
/// through unchanged.
#[derive(Clone)]
pub struct RequestIdResolver {
    sink: Arc<dyn LogSink>,
    tracer: Arc<dyn TraceReader>,
}

impl RequestIdResolver {
    pub fn new(sink: Arc<dyn LogSink>, tracer: Arc<dyn TraceReader>) -> Self {
        Self { sink, tracer }
    }

    /// Resolve the id for `context`, returning it with the derived context
    ///
    /// The input context is not modified; callers must hand the returned
    /// context to the handler.
    pub fn resolve(&self, context: &CallContext) -> (Option<RequestId>, CallContext) {
        let Some(incoming) = context.incoming_metadata() else {
            return (None, context.clone());
        };

        let supplied = incoming
            .get(REQUEST_ID_KEY)
            .and_then(|value| value.to_str().ok())
            .and_then(RequestId::from_header_value);

        let request_id = match supplied {
            Some(id) => id,
            None => {
                let id = RequestId::generate();
                self.sink
                    .debug(context, &format!("Creating Request ID: {}", id));
                id
            }
        };

        let mut metadata = incoming.clone();
        match request_id.as_str().parse::<AsciiMetadataValue>() {
            Ok(value) => {
                metadata.insert(REQUEST_ID_KEY, value);
            }
            Err(e) => {
                self.sink.debug(
                    context,
                    &format!("Unable to write '{}' {}: {}", REQUEST_ID_KEY, request_id, e),
                );
            }
        }

        let mut fields = vec![LogField::new(REQUEST_ID_FIELD, request_id.as_str())];
        if self.tracer.is_sampled(context) {
            fields.push(LogField::new(TRACE_ID_FIELD, self.tracer.trace_id(context)));
            fields.push(LogField::new(SPAN_ID_FIELD, self.tracer.span_id(context)));
        }

        let derived = self
            .sink
            .with_fields(context.clone(), fields)
            .with_value(RequestIdSlot(request_id.clone()))
            .with_incoming_metadata(metadata.clone())
            .with_outgoing_metadata(metadata);

        self.send_response_id(&derived, &request_id);

        (Some(request_id), derived)
    }

    /// Best effort: delivery failures are logged at debug and dropped
    fn send_response_id(&self, context: &CallContext, request_id: &RequestId) {
        let value = match request_id.as_str().parse::<AsciiMetadataValue>() {
            Ok(value) => value,
            Err(e) => {
                self.sink.debug(
                    context,
                    &format!("Unable to encode '{}' {}: {}", RESPONSE_ID_KEY, request_id, e),
                );
                return;
            }
        };

        let mut header = MetadataMap::new();
        header.insert(RESPONSE_ID_KEY, value);

        if let Err(e) = context.send_header(header) {
            self.sink.debug(
                context,
                &format!(
                    "Warning: Unable to set response header '{}' {}: {}",
                    RESPONSE_ID_KEY, request_id, e
                ),
            );
        }
    }
}

impl Default for RequestIdResolver {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink), Arc::new(OpenTelemetryReader))
    }
}

impl fmt::Debug for RequestIdResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIdResolver").finish_non_exhaustive()
    }
}
