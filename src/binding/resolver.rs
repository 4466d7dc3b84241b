//! One-shot binding against a hosting environment.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::error::{BindingFault, LinkError};
use super::host::{HostEnvironment, LinkContext};
use crate::lookup::ServiceLookup;

/// Outcome of the single binding attempt.
///
/// The unresolved state is represented by the absence of a `BindingState`
/// (an empty run-once cell in [`CapabilityLinker`](crate::CapabilityLinker)).
pub enum BindingState {
    /// The runtime handed back a lookup handle.
    Bound(Box<dyn ServiceLookup>),
    /// The environment does not offer the layer. Recoverable.
    Unsupported(LinkError),
    /// The runtime is present but failed to bootstrap. Fatal.
    Faulted(BindingFault),
}

impl BindingState {
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    pub fn handle(&self) -> Option<&dyn ServiceLookup> {
        match self {
            Self::Bound(handle) => Some(handle.as_ref()),
            _ => None,
        }
    }

    pub fn unsupported_reason(&self) -> Option<&LinkError> {
        match self {
            Self::Unsupported(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn fault(&self) -> Option<&BindingFault> {
        match self {
            Self::Faulted(fault) => Some(fault),
            _ => None,
        }
    }
}

impl fmt::Debug for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bound(_) => f.write_str("Bound"),
            Self::Unsupported(reason) => f.debug_tuple("Unsupported").field(reason).finish(),
            Self::Faulted(fault) => f.debug_tuple("Faulted").field(fault).finish(),
        }
    }
}

/// Locate `symbol` in `host`, invoke it once with `ctx`, and classify the
/// outcome.
///
/// - symbol missing or incompatible → [`BindingState::Unsupported`]
/// - host panics while locating → [`BindingState::Faulted`]
/// - entry point returns `Err` or panics → [`BindingState::Faulted`]
pub fn resolve(host: &dyn HostEnvironment, symbol: &str, ctx: &LinkContext) -> BindingState {
    log::debug!(
        "Binding capability runtime: symbol='{}' host={} api={}",
        symbol,
        host.describe(),
        ctx.api_version
    );

    // A host panic settles the state too; the caller's run-once cell must
    // never be left empty.
    let entry = match catch_unwind(AssertUnwindSafe(|| host.locate(symbol))) {
        Ok(Ok(entry)) => entry,
        Ok(Err(reason)) => {
            log::debug!("Capability runtime unavailable: {}", reason);
            return BindingState::Unsupported(reason);
        }
        Err(payload) => {
            let fault = BindingFault::from_panic(symbol, payload.as_ref());
            log::error!("{} (host: {})", fault, host.describe());
            return BindingState::Faulted(fault);
        }
    };

    match catch_unwind(AssertUnwindSafe(|| entry.invoke(ctx))) {
        Ok(Ok(handle)) => {
            log::info!("Capability runtime bound via '{}'", entry.symbol());
            BindingState::Bound(handle)
        }
        Ok(Err(err)) => {
            let fault = BindingFault::from_bootstrap(entry.symbol(), &err);
            log::error!("{}", fault);
            BindingState::Faulted(fault)
        }
        Err(payload) => {
            let fault = BindingFault::from_panic(entry.symbol(), payload.as_ref());
            log::error!("{}", fault);
            BindingState::Faulted(fault)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::error::BootstrapError;
    use crate::binding::host::{NoHost, ProcessHost, ENTRY_POINT_SYMBOL};
    use crate::capabilities::{CapabilityId, CapabilityInstance};

    #[test]
    fn test_resolve_missing_symbol_is_unsupported() {
        let host = ProcessHost::new();
        let state = resolve(&host, ENTRY_POINT_SYMBOL, &LinkContext::client());
        assert!(!state.is_bound());
        assert!(matches!(
            state.unsupported_reason(),
            Some(LinkError::NotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_disabled_host() {
        let state = resolve(&NoHost, ENTRY_POINT_SYMBOL, &LinkContext::client());
        assert_eq!(state.unsupported_reason(), Some(&LinkError::Disabled));
    }

    #[test]
    fn test_resolve_bound() {
        let host = ProcessHost::new();
        host.register(ENTRY_POINT_SYMBOL, |_| {
            Ok(Box::new(|_: &CapabilityId| -> Option<CapabilityInstance> { None }))
        });
        let state = resolve(&host, ENTRY_POINT_SYMBOL, &LinkContext::client());
        assert!(state.is_bound());
        assert!(state.handle().is_some());
    }

    #[test]
    fn test_resolve_bootstrap_error_is_fault() {
        let host = ProcessHost::new();
        host.register(ENTRY_POINT_SYMBOL, |_| {
            Err(BootstrapError::new("display connection refused"))
        });
        let state = resolve(&host, ENTRY_POINT_SYMBOL, &LinkContext::client());
        let fault = state.fault().unwrap();
        assert!(matches!(fault, BindingFault::Bootstrap { .. }));
        assert!(fault.to_string().contains("display connection refused"));
    }

    #[test]
    fn test_resolve_locate_panic_is_fault() {
        struct BrokenHost;
        impl HostEnvironment for BrokenHost {
            fn describe(&self) -> String {
                "broken".to_string()
            }
            fn locate(&self, _symbol: &str) -> Result<crate::binding::host::EntryPoint, LinkError> {
                panic!("symbol table corrupted")
            }
        }

        let state = resolve(&BrokenHost, ENTRY_POINT_SYMBOL, &LinkContext::client());
        match state {
            BindingState::Faulted(BindingFault::Panicked { symbol, message }) => {
                assert_eq!(symbol, ENTRY_POINT_SYMBOL);
                assert_eq!(message, "symbol table corrupted");
            }
            other => panic!("expected panic fault, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_panic_is_fault() {
        let host = ProcessHost::new();
        host.register(ENTRY_POINT_SYMBOL, |_| panic!("runtime internals corrupted"));
        let state = resolve(&host, ENTRY_POINT_SYMBOL, &LinkContext::client());
        match state {
            BindingState::Faulted(BindingFault::Panicked { message, .. }) => {
                assert_eq!(message, "runtime internals corrupted");
            }
            other => panic!("expected panic fault, got {:?}", other),
        }
    }
}
