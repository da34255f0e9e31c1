//! Correlation identifier value type
//!
//! A `RequestId` is the opaque token that links every log line and every
//! downstream call belonging to one originating request.

use std::fmt;
use uuid::Uuid;

/// Metadata key carrying the correlation id on inbound and downstream calls
pub const REQUEST_ID_KEY: &str = "x-request-id";

/// Metadata key used to return the resolved id to the original caller
pub const RESPONSE_ID_KEY: &str = "x-response-id";

/// Opaque per-call correlation identifier
///
/// ## Invariants
///
/// - Never empty
/// - Never carries leading or trailing whitespace
/// - Caller-supplied values are trusted verbatim (no format validation)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh id (UUID v4, hyphenated)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Build an id from a caller-supplied header value
    ///
    /// Surrounding whitespace is trimmed. Returns `None` when nothing is left,
    /// which callers treat the same as an absent header.
    ///
    /// ```rust
    /// use grpc_request_id::RequestId;
    ///
    /// let id = RequestId::from_header_value("  444444  ").unwrap();
    /// assert_eq!(id.as_str(), "444444");
    /// assert!(RequestId::from_header_value("   ").is_none());
    /// ```
    pub fn from_header_value(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
