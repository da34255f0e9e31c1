//! Structured logging fields and the logging collaborator

use crate::context::CallContext;

/// Field carrying the correlation id
pub const REQUEST_ID_FIELD: &str = "reqId";

/// Field carrying the sampled trace id
pub const TRACE_ID_FIELD: &str = "trace_id";

/// Field carrying the sampled span id
pub const SPAN_ID_FIELD: &str = "span_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogField {
    pub key: &'static str,
    pub value: String,
}

impl LogField {
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Logging sink the resolver writes through
///
/// Injected rather than global so tests can substitute a recording fake.
pub trait LogSink: Send + Sync {
    /// Attach fields to the call's logging scope, returning the derived context
    fn with_fields(&self, context: CallContext, fields: Vec<LogField>) -> CallContext;

    /// Emit a debug-level message within the call's logging scope
    fn debug(&self, context: &CallContext, message: &str);
}

/// `tracing`-backed sink
///
/// Fields live on the context and are materialized as span fields by
/// [`CallContext::span`]. Debug messages are single events carrying the same
/// fields, so they never open a span of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn with_fields(&self, context: CallContext, fields: Vec<LogField>) -> CallContext {
        context.with_fields(fields)
    }

    fn debug(&self, context: &CallContext, message: &str) {
        tracing::debug!(
            reqId = context.field(REQUEST_ID_FIELD),
            trace_id = context.field(TRACE_ID_FIELD),
            span_id = context.field(SPAN_ID_FIELD),
            "{}",
            message
        );
    }
}
