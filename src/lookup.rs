//! Service lookup handle — the narrow contract the runtime hands back.

use crate::capabilities::{CapabilityId, CapabilityInstance};

/// Resolves capability identifiers to runtime-provided instances.
///
/// Returned by a hosting environment's entry point once binding succeeds.
/// "Not supported" is an expected outcome and must be reported as `None`,
/// never as a panic.
pub trait ServiceLookup: Send + Sync {
    /// Return an instance implementing `id`, or `None` if the runtime does
    /// not support it.
    fn get_service(&self, id: &CapabilityId) -> Option<CapabilityInstance>;
}

impl<F> ServiceLookup for F
where
    F: Fn(&CapabilityId) -> Option<CapabilityInstance> + Send + Sync,
{
    fn get_service(&self, id: &CapabilityId) -> Option<CapabilityInstance> {
        self(id)
    }
}

impl std::fmt::Debug for dyn ServiceLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn ServiceLookup>")
    }
}
