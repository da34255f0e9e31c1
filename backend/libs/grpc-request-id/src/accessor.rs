//! Correlation id lookup

use crate::context::CallContext;
use crate::request_id::RequestId;

/// Private slot holding the resolved id
///
/// Values are keyed by type, and this type is not nameable outside the
/// crate, so no caller-chosen key can collide with it.
#[derive(Debug, Clone)]
pub(crate) struct RequestIdSlot(pub(crate) RequestId);

/// Return the correlation id resolved for this context
///
/// `None` when the context never went through resolution, e.g. a locally
/// synthesized call without inbound metadata.
pub fn get_id(context: &CallContext) -> Option<&RequestId> {
    context.value::<RequestIdSlot>().map(|slot| &slot.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_id_on_empty_context() {
        assert!(get_id(&CallContext::new()).is_none());
    }

    #[test]
    fn test_get_id_reads_slot() {
        let id = RequestId::generate();
        let context = CallContext::new().with_value(RequestIdSlot(id.clone()));

        assert_eq!(get_id(&context), Some(&id));
        assert_eq!(get_id(&context), get_id(&context));
    }

    #[test]
    fn test_plain_string_value_is_not_an_id() {
        let context = CallContext::new().with_value("x-request-id".to_string());
        assert!(get_id(&context).is_none());
    }
}
