//! Tracing collaborator and W3C trace context extraction

use crate::context::CallContext;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::{SpanContext, TraceContextExt};
use tonic::metadata::MetadataMap;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Read-only view of the distributed tracing state of a call
pub trait TraceReader: Send + Sync {
    fn is_sampled(&self, context: &CallContext) -> bool;
    fn trace_id(&self, context: &CallContext) -> String;
    fn span_id(&self, context: &CallContext) -> String;
}

/// Reader for processes without distributed tracing; never sampled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTracing;

impl TraceReader for NoTracing {
    fn is_sampled(&self, _context: &CallContext) -> bool {
        false
    }

    fn trace_id(&self, _context: &CallContext) -> String {
        String::new()
    }

    fn span_id(&self, _context: &CallContext) -> String {
        String::new()
    }
}

/// OpenTelemetry-backed reader
///
/// Reads the span of the current call: the active `tracing` span as seen by
/// `tracing-opentelemetry`. Without one it uses the trace parent extracted
/// from the call's inbound metadata, then the ambient OpenTelemetry context.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTelemetryReader;

impl OpenTelemetryReader {
    fn span_context(context: &CallContext) -> SpanContext {
        let active = tracing::Span::current().context();
        let span_context = active.span().span_context().clone();
        if span_context.is_valid() {
            return span_context;
        }

        match context.trace_context() {
            Some(cx) => cx.span().span_context().clone(),
            None => opentelemetry::Context::current()
                .span()
                .span_context()
                .clone(),
        }
    }
}

impl TraceReader for OpenTelemetryReader {
    fn is_sampled(&self, context: &CallContext) -> bool {
        let span_context = Self::span_context(context);
        span_context.is_valid() && span_context.is_sampled()
    }

    fn trace_id(&self, context: &CallContext) -> String {
        Self::span_context(context).trace_id().to_string()
    }

    fn span_id(&self, context: &CallContext) -> String {
        Self::span_context(context).span_id().to_string()
    }
}

/// HTTP header extractor for trace context propagation
pub(crate) struct HeaderExtractor<'a>(pub(crate) &'a http::HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// gRPC metadata extractor for trace context propagation
pub(crate) struct MetadataExtractor<'a>(pub(crate) &'a MetadataMap);

impl Extractor for MetadataExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .map(|k| match k {
                tonic::metadata::KeyRef::Ascii(k) => k.as_str(),
                tonic::metadata::KeyRef::Binary(k) => k.as_str(),
            })
            .collect()
    }
}

/// Extract the remote trace parent with the globally installed propagator
///
/// Without an installed propagator this yields an empty context, which
/// readers report as not sampled.
pub fn extract_trace_context(headers: &http::HeaderMap) -> opentelemetry::Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

pub fn extract_from_metadata(metadata: &MetadataMap) -> opentelemetry::Context {
    global::get_text_map_propagator(|propagator| {
        propagator.extract(&MetadataExtractor(metadata))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_fields::{SPAN_ID_FIELD, TRACE_ID_FIELD};
    use crate::resolver::RequestIdResolver;
    use opentelemetry::propagation::TextMapPropagator;
    use opentelemetry::trace::{SpanId, TraceFlags, TraceId, TraceState, TracerProvider as _};
    use opentelemetry_sdk::propagation::TraceContextPropagator;
    use opentelemetry_sdk::trace::TracerProvider;
    use tracing_subscriber::layer::SubscriberExt;

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    fn remote_context(flags: TraceFlags) -> opentelemetry::Context {
        let span_context = SpanContext::new(
            TraceId::from_hex(TRACE_ID).unwrap(),
            SpanId::from_hex(SPAN_ID).unwrap(),
            flags,
            true,
            TraceState::default(),
        );
        opentelemetry::Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn test_header_extractor() {
        let mut headers = http::HeaderMap::new();
        headers.insert("traceparent", "00-abc-def-01".parse().unwrap());

        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(extractor.keys(), vec!["traceparent"]);
    }

    #[test]
    fn test_metadata_extractor() {
        let mut metadata = MetadataMap::new();
        metadata.insert("traceparent", "00-abc-def-01".parse().unwrap());

        let extractor = MetadataExtractor(&metadata);
        assert_eq!(extractor.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(extractor.get("tracestate"), None);
    }

    #[test]
    fn test_sampled_remote_parent() {
        let context = CallContext::new().with_trace_context(remote_context(TraceFlags::SAMPLED));

        let reader = OpenTelemetryReader;
        assert!(reader.is_sampled(&context));
        assert_eq!(reader.trace_id(&context), TRACE_ID);
        assert_eq!(reader.span_id(&context), SPAN_ID);
    }

    #[test]
    fn test_unsampled_remote_parent() {
        let context = CallContext::new().with_trace_context(remote_context(TraceFlags::default()));
        assert!(!OpenTelemetryReader.is_sampled(&context));
    }

    #[test]
    fn test_no_active_trace_is_not_sampled() {
        assert!(!OpenTelemetryReader.is_sampled(&CallContext::new()));
        assert!(!NoTracing.is_sampled(&CallContext::new()));
    }

    #[test]
    fn test_w3c_traceparent_round_trips_through_reader() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            "traceparent",
            format!("00-{TRACE_ID}-{SPAN_ID}-01").parse().unwrap(),
        );

        let parent = TraceContextPropagator::new().extract(&HeaderExtractor(&headers));
        let context = CallContext::new().with_trace_context(parent);

        assert!(OpenTelemetryReader.is_sampled(&context));
        assert_eq!(OpenTelemetryReader.trace_id(&context), TRACE_ID);
    }

    /// The provider must outlive the spans; tracers only hold a weak reference
    fn otel_subscriber() -> (TracerProvider, impl tracing::Subscriber + Send + Sync + 'static) {
        let provider = TracerProvider::builder().build();
        let tracer = provider.tracer("grpc-request-id-test");
        let subscriber =
            tracing_subscriber::registry().with(tracing_opentelemetry::layer().with_tracer(tracer));
        (provider, subscriber)
    }

    #[test]
    fn test_active_span_of_locally_sampled_call() {
        let (_provider, subscriber) = otel_subscriber();
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("server_call");
            let _entered = span.enter();
            let active = span.context().span().span_context().clone();
            assert!(active.is_sampled());

            let context = CallContext::new();
            assert!(OpenTelemetryReader.is_sampled(&context));
            assert_eq!(OpenTelemetryReader.trace_id(&context), active.trace_id().to_string());
            assert_eq!(OpenTelemetryReader.span_id(&context), active.span_id().to_string());
        });
    }

    #[test]
    fn test_active_span_wins_over_remote_parent() {
        let (_provider, subscriber) = otel_subscriber();
        tracing::subscriber::with_default(subscriber, || {
            let parent = remote_context(TraceFlags::SAMPLED);
            let span = tracing::info_span!("server_call");
            span.set_parent(parent.clone());
            let _entered = span.enter();

            let context = CallContext::new().with_trace_context(parent);
            assert_eq!(OpenTelemetryReader.trace_id(&context), TRACE_ID);
            assert_ne!(OpenTelemetryReader.span_id(&context), SPAN_ID);
        });
    }

    #[test]
    fn test_resolver_attaches_ids_of_active_span() {
        let (_provider, subscriber) = otel_subscriber();
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("server_call");
            let _entered = span.enter();
            let active = span.context().span().span_context().clone();

            let mut metadata = MetadataMap::new();
            metadata.insert("x-request-id", "abc".parse().unwrap());
            let context = CallContext::new().with_incoming_metadata(metadata);

            let (_, derived) = RequestIdResolver::default().resolve(&context);
            assert_eq!(
                derived.field(TRACE_ID_FIELD),
                Some(active.trace_id().to_string().as_str())
            );
            assert_eq!(
                derived.field(SPAN_ID_FIELD),
                Some(active.span_id().to_string().as_str())
            );
        });
    }
}
