//! Per-call response header channel

use crate::context::HeaderSender;
use crate::error::SendHeaderError;
use std::sync::{Arc, Mutex, PoisonError};
use tonic::metadata::MetadataMap;

#[derive(Default)]
enum HeaderState {
    #[default]
    Pending,
    Sent(MetadataMap),
    Flushed,
}

/// Response header channel of one call
///
/// Accepts a single send. The queued metadata is merged into the outgoing
/// response by whoever builds it: [`RequestIdService`](crate::RequestIdService)
/// for HTTP responses, the interceptors for `tonic::Response`/`Status`.
#[derive(Clone, Default)]
pub struct ResponseHeaders {
    state: Arc<Mutex<HeaderState>>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn take(&self) -> Option<MetadataMap> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *state, HeaderState::Flushed) {
            HeaderState::Sent(metadata) => Some(metadata),
            HeaderState::Pending | HeaderState::Flushed => None,
        }
    }

    /// Move queued metadata into `headers`; later sends are rejected
    pub fn flush_into(&self, headers: &mut http::HeaderMap) {
        if let Some(metadata) = self.take() {
            headers.extend(metadata.into_headers());
        }
    }

    /// Move queued metadata into tonic response or status metadata
    pub fn flush_into_metadata(&self, metadata: &mut MetadataMap) {
        if let Some(queued) = self.take() {
            let mut headers = std::mem::take(metadata).into_headers();
            headers.extend(queued.into_headers());
            *metadata = MetadataMap::from_headers(headers);
        }
    }
}

impl HeaderSender for ResponseHeaders {
    fn send_header(&self, metadata: MetadataMap) -> Result<(), SendHeaderError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            HeaderState::Pending => {
                *state = HeaderState::Sent(metadata);
                Ok(())
            }
            HeaderState::Sent(_) | HeaderState::Flushed => Err(SendHeaderError::AlreadySent),
        }
    }
}
