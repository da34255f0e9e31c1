//! Call-scoped execution context
//!
//! `CallContext` is the Rust counterpart of a per-call context value: it is
//! cheap to clone and every `with_*` method returns a derived copy, so a
//! handle taken before resolution never observes the changes made by it.

use crate::error::SendHeaderError;
use crate::headers::ResponseHeaders;
use crate::log_fields::{LogField, REQUEST_ID_FIELD, SPAN_ID_FIELD, TRACE_ID_FIELD};
use crate::trace::extract_from_metadata;
use std::fmt;
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Out-of-band channel used to return metadata to the original caller
///
/// Implementations decide when the metadata actually reaches the wire.
/// [`ResponseHeaders`] queues it until the response head is built, so it
/// always precedes any payload.
pub trait HeaderSender: Send + Sync {
    fn send_header(&self, metadata: MetadataMap) -> Result<(), SendHeaderError>;
}

/// Immutable, copy-on-write context attached to one call
#[derive(Clone, Default)]
pub struct CallContext {
    incoming: Option<MetadataMap>,
    outgoing: Option<MetadataMap>,
    fields: Vec<LogField>,
    trace_context: Option<opentelemetry::Context>,
    header_sender: Option<Arc<dyn HeaderSender>>,
    values: http::Extensions,
}

impl CallContext {
    /// Empty context, as seen by locally synthesized calls
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context for a tonic request
    ///
    /// If a `RequestIdLayer` already placed a context in the request
    /// extensions that context is reused; otherwise a fresh one is built from
    /// the request metadata, with its own [`ResponseHeaders`] channel.
    pub fn from_request<T>(request: &tonic::Request<T>) -> Self {
        if let Some(context) = request.extensions().get::<CallContext>() {
            return context.clone();
        }

        let metadata = request.metadata();
        Self::new()
            .with_trace_context(extract_from_metadata(metadata))
            .with_response_headers(ResponseHeaders::new())
            .with_incoming_metadata(metadata.clone())
    }

    pub fn with_incoming_metadata(mut self, metadata: MetadataMap) -> Self {
        self.incoming = Some(metadata);
        self
    }

    pub fn with_outgoing_metadata(mut self, metadata: MetadataMap) -> Self {
        self.outgoing = Some(metadata);
        self
    }

    pub fn with_trace_context(mut self, trace_context: opentelemetry::Context) -> Self {
        self.trace_context = Some(trace_context);
        self
    }

    pub fn with_header_sender(mut self, sender: Arc<dyn HeaderSender>) -> Self {
        self.header_sender = Some(sender);
        self
    }

    /// Use `headers` as the header sender and keep it reachable for flushing
    pub fn with_response_headers(self, headers: ResponseHeaders) -> Self {
        self.with_header_sender(Arc::new(headers.clone()))
            .with_value(headers)
    }

    /// Attach structured logging fields; a field with an existing key replaces it
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = LogField>) -> Self {
        for field in fields {
            match self.fields.iter_mut().find(|f| f.key == field.key) {
                Some(existing) => existing.value = field.value,
                None => self.fields.push(field),
            }
        }
        self
    }

    /// Store a typed value, keyed by its type
    pub fn with_value<T>(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.values.insert(value);
        self
    }

    pub fn value<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values.get::<T>()
    }

    /// Response header channel installed with [`with_response_headers`](Self::with_response_headers)
    pub fn response_headers(&self) -> Option<&ResponseHeaders> {
        self.value::<ResponseHeaders>()
    }

    pub fn incoming_metadata(&self) -> Option<&MetadataMap> {
        self.incoming.as_ref()
    }

    /// Metadata inherited by calls issued while handling this one
    pub fn outgoing_metadata(&self) -> Option<&MetadataMap> {
        self.outgoing.as_ref()
    }

    pub fn fields(&self) -> &[LogField] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    pub fn trace_context(&self) -> Option<&opentelemetry::Context> {
        self.trace_context.as_ref()
    }

    /// Deliver metadata to the caller through the attached header channel
    pub fn send_header(&self, metadata: MetadataMap) -> Result<(), SendHeaderError> {
        match &self.header_sender {
            Some(sender) => sender.send_header(metadata),
            None => Err(SendHeaderError::NoHeaderSender),
        }
    }

    /// Logging scope for the call
    ///
    /// Every event emitted inside the returned span carries the context's
    /// `reqId`, `trace_id` and `span_id` fields when they are set.
    pub fn span(&self) -> tracing::Span {
        let span = tracing::info_span!(
            "grpc_call",
            reqId = tracing::field::Empty,
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
        );

        for field in &self.fields {
            if matches!(field.key, REQUEST_ID_FIELD | TRACE_ID_FIELD | SPAN_ID_FIELD) {
                span.record(field.key, field.value.as_str());
            }
        }

        if let Some(parent) = &self.trace_context {
            span.set_parent(parent.clone());
        }

        span
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("incoming", &self.incoming)
            .field("outgoing", &self.outgoing)
            .field("fields", &self.fields)
            .field("has_trace_context", &self.trace_context.is_some())
            .field("has_header_sender", &self.header_sender.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Tenant(&'static str);

    #[test]
    fn test_derived_context_leaves_original_untouched() {
        let original = CallContext::new();
        let derived = original
            .clone()
            .with_fields([LogField::new(REQUEST_ID_FIELD, "abc")])
            .with_value(Tenant("acme"));

        assert!(original.fields().is_empty());
        assert!(original.value::<Tenant>().is_none());
        assert_eq!(derived.field(REQUEST_ID_FIELD), Some("abc"));
        assert_eq!(derived.value::<Tenant>(), Some(&Tenant("acme")));
    }

    #[test]
    fn test_with_fields_replaces_same_key() {
        let context = CallContext::new()
            .with_fields([LogField::new(REQUEST_ID_FIELD, "first")])
            .with_fields([LogField::new(REQUEST_ID_FIELD, "second")]);

        assert_eq!(context.fields().len(), 1);
        assert_eq!(context.field(REQUEST_ID_FIELD), Some("second"));
    }

    #[test]
    fn test_send_header_without_sender() {
        let context = CallContext::new();
        let result = context.send_header(MetadataMap::new());
        assert_eq!(result, Err(SendHeaderError::NoHeaderSender));
    }

    #[test]
    fn test_from_request_reads_metadata() {
        let mut request = tonic::Request::new(());
        request
            .metadata_mut()
            .insert("x-request-id", "from-metadata".parse().unwrap());

        let context = CallContext::from_request(&request);
        let incoming = context.incoming_metadata().expect("metadata present");
        assert_eq!(
            incoming.get("x-request-id").unwrap().to_str().unwrap(),
            "from-metadata"
        );
    }

    #[test]
    fn test_from_request_installs_response_headers() {
        let request = tonic::Request::new(());
        let context = CallContext::from_request(&request);

        let mut metadata = MetadataMap::new();
        metadata.insert("x-response-id", "abc".parse().unwrap());
        assert!(context.send_header(metadata).is_ok());

        let mut response = tonic::Response::new(());
        context
            .response_headers()
            .expect("channel installed")
            .flush_into_metadata(response.metadata_mut());
        assert_eq!(
            response.metadata().get("x-response-id").unwrap().to_str().unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_from_request_prefers_installed_context() {
        let installed = CallContext::new().with_value(Tenant("installed"));
        let mut request = tonic::Request::new(());
        request.extensions_mut().insert(installed);

        let context = CallContext::from_request(&request);
        assert_eq!(context.value::<Tenant>(), Some(&Tenant("installed")));
        assert!(context.incoming_metadata().is_none());
    }
}
