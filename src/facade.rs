//! Client facade — the single entry point capability consumers use.
//!
//! A [`CapabilityLinker`] owns one hosting environment, binds against it at
//! most once, and caches what the runtime says about every identifier. The
//! process-wide instance lives behind [`linker`] and the free functions
//! re-exported from the crate root.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::binding::error::{panic_message, BindingFault, LinkError};
use crate::binding::host::{HostEnvironment, LinkContext, ENTRY_POINT_SYMBOL};
use crate::binding::resolver::{self, BindingState};
use crate::capabilities::{
    ApiVersion, Capability, CapabilityId, CapabilityInstance, CapabilityKind, KnownCapabilities,
    API_VERSION,
};
use crate::config::LinkConfig;

/// Binding outcome plus the moment it was reached.
struct Binding {
    state: BindingState,
    resolved_at: DateTime<Utc>,
}

/// Lazily bound view of one hosting environment's capabilities.
///
/// Binding happens on first use, exactly once, even when several threads race
/// for it; every thread then observes the same [`BindingState`]. Results are
/// cached per identifier, including "unsupported", and never re-queried.
pub struct CapabilityLinker {
    host: Box<dyn HostEnvironment>,
    symbol: String,
    context: LinkContext,
    binding: OnceLock<Binding>,
    cache: DashMap<CapabilityId, Option<CapabilityInstance>>,
}

impl CapabilityLinker {
    /// Linker for `host`, looking for the standard entry point.
    pub fn new(host: impl HostEnvironment + 'static) -> Self {
        Self::with_symbol(host, ENTRY_POINT_SYMBOL)
    }

    /// Linker for `host`, looking for a custom entry point.
    pub fn with_symbol(host: impl HostEnvironment + 'static, symbol: impl Into<String>) -> Self {
        Self::from_parts(Box::new(host), symbol.into())
    }

    /// Linker for the hosting environment selected by `config`.
    pub fn from_config(config: &LinkConfig) -> Self {
        Self::from_parts(config.host(), config.entry_point.clone())
    }

    fn from_parts(host: Box<dyn HostEnvironment>, symbol: String) -> Self {
        Self {
            host,
            symbol,
            context: LinkContext::client(),
            binding: OnceLock::new(),
            cache: DashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    fn binding(&self) -> &Binding {
        self.binding.get_or_init(|| Binding {
            state: resolver::resolve(self.host.as_ref(), &self.symbol, &self.context),
            resolved_at: Utc::now(),
        })
    }

    /// Bind if needed and return the outcome.
    pub fn state(&self) -> &BindingState {
        &self.binding().state
    }

    /// Bind if needed; a faulted runtime is returned as `Err`.
    pub fn ensure_bound(&self) -> Result<&Self, BindingFault> {
        match self.state() {
            BindingState::Faulted(fault) => Err(fault.clone()),
            _ => Ok(self),
        }
    }

    /// Whether the hosting environment provides the capability layer.
    pub fn is_available(&self) -> bool {
        self.state().is_bound()
    }

    /// Why the layer is unavailable, if it is.
    pub fn unsupported_reason(&self) -> Option<&LinkError> {
        self.state().unsupported_reason()
    }

    /// Version of the client-side capability set.
    pub fn api_version(&self) -> ApiVersion {
        self.context.api_version
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Untyped lookup. `None` when unbound, faulted or unsupported.
    ///
    /// Identifiers outside the client's known set are never forwarded to the
    /// runtime and never cached, so the cache holds at most one entry per
    /// known capability.
    pub fn get_service(&self, id: &CapabilityId) -> Option<CapabilityInstance> {
        let handle = self.state().handle()?;

        if !self.context.known.contains(id.as_str()) {
            log::debug!("Capability {} is not in the known set", id);
            return None;
        }

        if let Some(cached) = self.cache.get(id) {
            return cached.value().clone();
        }

        // Query outside the map lock: the runtime may call back into us.
        let fresh = handle.get_service(id);
        if fresh.is_none() {
            log::debug!("Capability {} not supported by runtime", id);
        }
        // First answer wins so every caller sees the same instance.
        self.cache
            .entry(id.clone())
            .or_insert(fresh)
            .value()
            .clone()
    }

    /// Typed lookup of capability `T`.
    pub fn get<T: Capability + ?Sized>(&self) -> Option<Arc<T>> {
        let id = CapabilityId::of::<T>();
        let instance = self.get_service(&id)?;
        let typed = instance.downcast::<T>();
        if typed.is_none() {
            log::warn!(
                "Runtime returned an instance of the wrong type for {}; treating as unsupported",
                id
            );
        }
        typed
    }

    /// Whether capability `T` can be obtained.
    pub fn is_supported<T: Capability + ?Sized>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Typed lookup with a fallback.
    ///
    /// The fallback runs only if the runtime yields nothing. Any failure on
    /// either path, including a returned `Err` or a panic, ends as `None`.
    pub fn get_or_else<T, F, E>(&self, fallback: F) -> Option<Arc<T>>
    where
        T: Capability + ?Sized,
        F: FnOnce() -> Result<Arc<T>, E>,
        E: fmt::Display,
    {
        let primary = catch_unwind(AssertUnwindSafe(|| self.get::<T>())).unwrap_or_else(|payload| {
            log::debug!(
                "Lookup of {} panicked: {}",
                T::ID,
                panic_message(payload.as_ref())
            );
            None
        });
        if primary.is_some() {
            return primary;
        }

        match catch_unwind(AssertUnwindSafe(fallback)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                log::debug!("Fallback for {} failed: {}", T::ID, e);
                None
            }
            Err(payload) => {
                log::debug!(
                    "Fallback for {} panicked: {}",
                    T::ID,
                    panic_message(payload.as_ref())
                );
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Snapshot of the binding outcome and per-capability support.
    ///
    /// Probing support resolves (and caches) every known identifier.
    pub fn binding_report(&self) -> BindingReport {
        let binding = self.binding();
        let capabilities = self
            .context
            .known
            .iter()
            .map(|(id, kind)| CapabilitySupport {
                supported: self.get_service(&id).is_some(),
                id,
                kind,
            })
            .collect();
        BindingReport {
            available: binding.state.is_bound(),
            api_version: self.context.api_version,
            host: self.host.describe(),
            entry_point: self.symbol.clone(),
            unsupported_reason: binding.state.unsupported_reason().map(|e| e.to_string()),
            fault: binding.state.fault().map(|f| f.to_string()),
            resolved_at: binding.resolved_at,
            capabilities,
        }
    }

    /// Identifiers this client knows about.
    pub fn known_capabilities(&self) -> &'static KnownCapabilities {
        self.context.known
    }
}

impl fmt::Debug for CapabilityLinker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityLinker")
            .field("host", &self.host.describe())
            .field("symbol", &self.symbol)
            .field("state", &self.binding.get().map(|b| &b.state))
            .field("cached", &self.cache.len())
            .finish()
    }
}

/// Support status of one known capability.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitySupport {
    pub id: CapabilityId,
    pub kind: CapabilityKind,
    pub supported: bool,
}

/// Serializable summary of a linker's binding.
#[derive(Debug, Clone, Serialize)]
pub struct BindingReport {
    pub available: bool,
    pub api_version: ApiVersion,
    pub host: String,
    pub entry_point: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsupported_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    pub resolved_at: DateTime<Utc>,
    pub capabilities: Vec<CapabilitySupport>,
}

// ---------------------------------------------------------------------------
// Process-wide linker
// ---------------------------------------------------------------------------

static LINKER: OnceLock<CapabilityLinker> = OnceLock::new();

fn global() -> &'static CapabilityLinker {
    LINKER.get_or_init(|| {
        let config = LinkConfig::from_env();
        log::debug!("Initializing process-wide capability linker: {:?}", config);
        CapabilityLinker::from_config(&config)
    })
}

/// The process-wide linker, bound if needed.
///
/// Configuration comes from the environment (see [`LinkConfig::from_env`]).
/// A faulted runtime is returned as `Err` on every call.
pub fn try_linker() -> Result<&'static CapabilityLinker, BindingFault> {
    global().ensure_bound()
}

/// The process-wide linker, bound if needed.
///
/// # Panics
///
/// Panics on every call if the hosting environment's entry point was found
/// but failed to bootstrap. Running on top of a known-broken runtime is not a
/// degraded mode this crate offers.
pub fn linker() -> &'static CapabilityLinker {
    match try_linker() {
        Ok(linker) => linker,
        Err(fault) => panic!("{}", fault),
    }
}

/// Whether the process runs on a hosting environment that implements the
/// capability layer. See [`linker`] for the panic condition.
pub fn is_available() -> bool {
    linker().is_available()
}

/// Version of the client-side capability set. Never binds.
pub fn api_version() -> ApiVersion {
    API_VERSION
}

/// Capability `T` from the process-wide linker.
pub fn get<T: Capability + ?Sized>() -> Option<Arc<T>> {
    linker().get::<T>()
}

/// Whether capability `T` is supported by the process-wide linker.
pub fn is_supported<T: Capability + ?Sized>() -> bool {
    linker().is_supported::<T>()
}

/// Capability `T` from the process-wide linker, or the fallback's value.
pub fn get_or_else<T, F, E>(fallback: F) -> Option<Arc<T>>
where
    T: Capability + ?Sized,
    F: FnOnce() -> Result<Arc<T>, E>,
    E: fmt::Display,
{
    linker().get_or_else::<T, F, E>(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::error::BootstrapError;
    use crate::binding::host::{NoHost, ProcessHost};
    use crate::lookup::ServiceLookup;
    use crate::runtime::ServiceTable;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    trait WindowMove: Send + Sync {
        fn start(&self) -> &'static str;
    }
    trait Keyboard: Send + Sync {}

    crate::declare_capability!(dyn WindowMove => "hostcaps.WindowMove");
    crate::declare_capability!(dyn Keyboard => "hostcaps.Keyboard");

    struct NativeMove;
    impl WindowMove for NativeMove {
        fn start(&self) -> &'static str {
            "native"
        }
    }

    struct EmulatedMove;
    impl WindowMove for EmulatedMove {
        fn start(&self) -> &'static str {
            "emulated"
        }
    }

    fn emulated() -> Result<Arc<dyn WindowMove>, String> {
        Ok(Arc::new(EmulatedMove))
    }

    /// Host whose runtime supports `WindowMove` but not `Keyboard`.
    fn partial_host() -> (ProcessHost, Arc<AtomicUsize>) {
        let host = ProcessHost::new();
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = invocations.clone();
        host.register(ENTRY_POINT_SYMBOL, move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            let table = ServiceTable::new().service::<dyn WindowMove, _>(|| {
                Some(Arc::new(NativeMove) as Arc<dyn WindowMove>)
            });
            Ok(Box::new(table.into_lookup(ctx)))
        });
        (host, invocations)
    }

    #[test]
    fn test_unsupported_environment() {
        let linker = CapabilityLinker::new(ProcessHost::new());
        assert!(!linker.is_available());
        assert!(matches!(
            linker.unsupported_reason(),
            Some(LinkError::NotFound { .. })
        ));
        assert!(linker.get::<dyn WindowMove>().is_none());
        assert!(linker.get::<dyn Keyboard>().is_none());

        let fallback = linker.get_or_else::<dyn WindowMove, _, _>(emulated).unwrap();
        assert_eq!(fallback.start(), "emulated");
    }

    #[test]
    fn test_partial_support() {
        let (host, _) = partial_host();
        let linker = CapabilityLinker::new(host);
        assert!(linker.is_available());

        let native = linker.get::<dyn WindowMove>().unwrap();
        assert_eq!(native.start(), "native");
        assert!(linker.is_supported::<dyn WindowMove>());
        assert!(!linker.is_supported::<dyn Keyboard>());

        // Primary path wins over the fallback when it yields something.
        let chosen = linker.get_or_else::<dyn WindowMove, _, _>(emulated).unwrap();
        assert_eq!(chosen.start(), "native");
    }

    #[test]
    fn test_fallback_used_for_unsupported_capability() {
        struct SoftKeyboard;
        impl Keyboard for SoftKeyboard {}

        let (host, _) = partial_host();
        let linker = CapabilityLinker::new(host);
        let keyboard = linker.get_or_else::<dyn Keyboard, _, String>(|| {
            Ok(Arc::new(SoftKeyboard) as Arc<dyn Keyboard>)
        });
        assert!(keyboard.is_some());
    }

    #[test]
    fn test_unknown_identifier_yields_nothing() {
        let (host, _) = partial_host();
        let linker = CapabilityLinker::new(host);
        assert!(linker
            .get_service(&CapabilityId::new("hostcaps.DoesNotExist"))
            .is_none());
        assert!(linker.get_service(&CapabilityId::new("")).is_none());
    }

    #[test]
    fn test_unknown_identifiers_are_not_forwarded_or_cached() {
        let queried = Arc::new(AtomicUsize::new(0));
        let counter = queried.clone();
        let host = ProcessHost::new();
        host.register(ENTRY_POINT_SYMBOL, move |_| {
            let counter = counter.clone();
            Ok(Box::new(move |_: &CapabilityId| -> Option<CapabilityInstance> {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            }))
        });
        let linker = CapabilityLinker::new(host);

        for i in 0..100 {
            let id = CapabilityId::new(format!("plugin.Generated{}", i));
            assert!(linker.get_service(&id).is_none());
        }
        assert_eq!(queried.load(Ordering::SeqCst), 0);
        assert_eq!(linker.cache.len(), 0);

        assert!(linker.get::<dyn Keyboard>().is_none());
        assert!(linker.get::<dyn Keyboard>().is_none());
        assert_eq!(queried.load(Ordering::SeqCst), 1);
        assert_eq!(linker.cache.len(), 1);
    }

    #[test]
    fn test_repeated_requests_are_stable_and_bind_once() {
        let (host, invocations) = partial_host();
        let linker = CapabilityLinker::new(host);

        let a = linker.get::<dyn WindowMove>().unwrap();
        let b = linker.get::<dyn WindowMove>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(linker.get::<dyn Keyboard>().is_none());
        assert!(linker.get::<dyn Keyboard>().is_none());
        assert!(linker.is_available());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use_binds_once() {
        const THREADS: usize = 16;
        let (host, invocations) = partial_host();
        let linker = Arc::new(CapabilityLinker::new(host));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let linker = linker.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if i % 2 == 0 {
                        linker.is_available()
                    } else {
                        linker.get::<dyn WindowMove>().is_some()
                    }
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_lookups_share_one_instance() {
        const THREADS: usize = 8;
        let (host, _) = partial_host();
        let linker = Arc::new(CapabilityLinker::new(host));
        let barrier = Arc::new(Barrier::new(THREADS));

        let instances: Vec<Arc<dyn WindowMove>> = (0..THREADS)
            .map(|_| {
                let linker = linker.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    linker.get::<dyn WindowMove>().unwrap()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        for instance in &instances[1..] {
            assert!(Arc::ptr_eq(&instances[0], instance));
        }
    }

    #[test]
    fn test_bootstrap_error_faults_linker() {
        let host = ProcessHost::new();
        host.register(ENTRY_POINT_SYMBOL, |_| Err(BootstrapError::new("no display")));
        let linker = CapabilityLinker::new(host);

        let fault = linker.ensure_bound().unwrap_err();
        assert!(fault.to_string().contains("no display"));
        // Same diagnosis on every call; no re-attempt.
        assert_eq!(linker.ensure_bound().unwrap_err(), fault);
        assert!(!linker.is_available());
    }

    #[test]
    fn test_panicking_host_is_located_once() {
        struct PanickingHost(Arc<AtomicUsize>);
        impl HostEnvironment for PanickingHost {
            fn describe(&self) -> String {
                "panicking".to_string()
            }
            fn locate(
                &self,
                _symbol: &str,
            ) -> Result<crate::binding::host::EntryPoint, LinkError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                panic!("host lookup bug")
            }
        }

        let attempts = Arc::new(AtomicUsize::new(0));
        let linker = CapabilityLinker::new(PanickingHost(attempts.clone()));

        for _ in 0..3 {
            let available = catch_unwind(AssertUnwindSafe(|| linker.is_available()));
            assert!(matches!(available, Ok(false)));
        }
        assert!(linker.get::<dyn WindowMove>().is_none());
        let fault = linker.ensure_bound().unwrap_err();
        assert!(fault.to_string().contains("host lookup bug"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fallback_failures_are_absorbed() {
        let linker = CapabilityLinker::new(NoHost);

        let failed = linker.get_or_else::<dyn WindowMove, _, _>(|| Err("fallback broke"));
        assert!(failed.is_none());

        let panicked = linker
            .get_or_else::<dyn WindowMove, _, String>(|| panic!("fallback exploded"));
        assert!(panicked.is_none());
    }

    #[test]
    fn test_primary_and_fallback_both_panicking_yields_none() {
        struct PanickingLookup;
        impl ServiceLookup for PanickingLookup {
            fn get_service(&self, _id: &CapabilityId) -> Option<CapabilityInstance> {
                panic!("runtime lookup bug")
            }
        }

        let host = ProcessHost::new();
        host.register(ENTRY_POINT_SYMBOL, |_| Ok(Box::new(PanickingLookup)));
        let linker = CapabilityLinker::new(host);
        assert!(linker.is_available());

        let result =
            linker.get_or_else::<dyn WindowMove, _, String>(|| panic!("fallback exploded too"));
        assert!(result.is_none());
    }

    #[test]
    fn test_wrong_instance_type_is_unsupported() {
        let host = ProcessHost::new();
        host.register(ENTRY_POINT_SYMBOL, |_| {
            // Answers every request with a WindowMove, whatever was asked.
            Ok(Box::new(|_: &CapabilityId| {
                Some(CapabilityInstance::new(Arc::new(NativeMove) as Arc<dyn WindowMove>))
            }))
        });
        let linker = CapabilityLinker::new(host);
        assert!(linker.get::<dyn WindowMove>().is_some());
        assert!(linker.get::<dyn Keyboard>().is_none());
    }

    #[test]
    fn test_binding_report() {
        let (host, _) = partial_host();
        let linker = CapabilityLinker::new(host);
        let report = linker.binding_report();

        assert!(report.available);
        assert_eq!(report.api_version, API_VERSION);
        assert!(report.fault.is_none());
        assert!(report.unsupported_reason.is_none());
        assert_eq!(report.capabilities.len(), linker.known_capabilities().len());

        let supported: Vec<&str> = report
            .capabilities
            .iter()
            .filter(|c| c.supported)
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(supported, vec!["hostcaps.WindowMove"]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["available"], serde_json::json!(true));
        assert!(json.get("fault").is_none());
    }

    #[test]
    fn test_binding_report_for_disabled_host() {
        let linker = CapabilityLinker::new(NoHost);
        let report = linker.binding_report();
        assert!(!report.available);
        assert_eq!(report.host, "disabled");
        assert!(report.unsupported_reason.unwrap().contains("disabled"));
        assert!(report.capabilities.iter().all(|c| !c.supported));
    }
}
