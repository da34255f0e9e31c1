//! Client-side propagation of the resolved id to downstream services

use crate::context::CallContext;
use crate::request_id::{RequestId, REQUEST_ID_KEY};
use tonic::metadata::{AsciiMetadataValue, KeyAndValueRef, MetadataMap};
use tonic::service::Interceptor;
use tonic::{Request, Status};

/// Keys owned by the transport; never copied into outgoing calls
const RESERVED_KEYS: &[&str] = &[
    "content-type",
    "content-length",
    "te",
    "user-agent",
    "host",
    "connection",
];

fn is_reserved(key: &str) -> bool {
    key.starts_with("grpc-") || key.starts_with(':') || RESERVED_KEYS.contains(&key)
}

/// Interceptor that forwards a call's outgoing metadata to downstream calls
///
/// Entries already set on the outgoing request are left alone, except for
/// `x-request-id`, which always carries the id of the current call.
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_request_id::RequestIdExt;
/// use tonic::{Request, Response, Status};
///
/// async fn handler(request: Request<()>) -> Result<Response<()>, Status> {
///     let propagator = request.propagator();
///
///     let channel = tonic::transport::Channel::from_static("http://[::1]:50052")
///         .connect()
///         .await
///         .map_err(|e| Status::unavailable(e.to_string()))?;
///
///     // let mut client = RankingServiceClient::with_interceptor(channel, propagator);
///     # let _ = (channel, propagator);
///     Ok(Response::new(()))
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestIdPropagator {
    metadata: MetadataMap,
    request_id: Option<AsciiMetadataValue>,
}

impl RequestIdPropagator {
    pub fn from_context(context: &CallContext) -> Self {
        let metadata = context.outgoing_metadata().cloned().unwrap_or_default();
        let request_id = metadata.get(REQUEST_ID_KEY).cloned();
        Self {
            metadata,
            request_id,
        }
    }

    /// Id forwarded to downstream calls, if the context carried one
    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
            .as_ref()
            .and_then(|value| value.to_str().ok())
            .and_then(RequestId::from_header_value)
    }
}

impl Interceptor for RequestIdPropagator {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let preset = request.metadata().clone();
        let target = request.metadata_mut();

        for entry in self.metadata.iter() {
            match entry {
                KeyAndValueRef::Ascii(key, value) => {
                    let name = key.as_str();
                    if name == REQUEST_ID_KEY || is_reserved(name) || preset.contains_key(name) {
                        continue;
                    }
                    target.append(key.clone(), value.clone());
                }
                KeyAndValueRef::Binary(key, value) => {
                    if preset.contains_key(key.as_str()) {
                        continue;
                    }
                    target.append_bin(key.clone(), value.clone());
                }
            }
        }

        if let Some(id) = &self.request_id {
            target.insert(REQUEST_ID_KEY, id.clone());
        }

        Ok(request)
    }
}
