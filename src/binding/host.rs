//! Hosting environments and the entry-point contract.
//!
//! A hosting environment is whatever the client happens to run inside. It
//! may export a well-known entry point ([`ENTRY_POINT_SYMBOL`]); invoking it
//! with a [`LinkContext`] yields the runtime's [`ServiceLookup`] handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::error::{BootstrapError, LinkError};
use crate::capabilities::{ApiVersion, KnownCapabilities, API_VERSION};
use crate::lookup::ServiceLookup;

/// Name of the entry point every hosting environment is asked for.
pub const ENTRY_POINT_SYMBOL: &str = "hostcaps_bootstrap";

/// Revision of the in-memory entry-point contract.
///
/// Bumped whenever [`LinkContext`], [`ServiceLookup`] or
/// [`CapabilityInstance`](crate::capabilities::CapabilityInstance) change
/// layout, so a dynamically loaded runtime built against another revision is
/// rejected instead of invoked.
pub const ABI_VERSION: u32 = 1;

/// Context handed to the entry point.
#[derive(Debug, Clone)]
pub struct LinkContext {
    /// Version of the client-side capability set.
    pub api_version: ApiVersion,
    /// Identifiers the client knows how to request.
    pub known: &'static KnownCapabilities,
    /// Entry-point contract revision the client was built with.
    pub abi_version: u32,
}

impl LinkContext {
    /// Context describing this client build.
    pub fn client() -> Self {
        Self {
            api_version: API_VERSION,
            known: KnownCapabilities::client(),
            abi_version: ABI_VERSION,
        }
    }
}

/// Result of a successful bootstrap.
pub type BootstrapResult = Result<Box<dyn ServiceLookup>, BootstrapError>;

/// A located, invocable entry point.
#[derive(Clone)]
pub struct EntryPoint {
    symbol: String,
    func: Arc<dyn Fn(&LinkContext) -> BootstrapResult + Send + Sync>,
}

impl EntryPoint {
    pub fn new<F>(symbol: impl Into<String>, func: F) -> Self
    where
        F: Fn(&LinkContext) -> BootstrapResult + Send + Sync + 'static,
    {
        Self {
            symbol: symbol.into(),
            func: Arc::new(func),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Invoke the entry point. Panics raised by the implementation propagate.
    pub fn invoke(&self, ctx: &LinkContext) -> BootstrapResult {
        (self.func)(ctx)
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("symbol", &self.symbol)
            .finish_non_exhaustive()
    }
}

/// Something that can be searched for the entry point.
pub trait HostEnvironment: Send + Sync {
    /// Short description used in logs and reports.
    fn describe(&self) -> String;

    /// Look up `symbol`. Absence and contract mismatches are `LinkError`s.
    fn locate(&self, symbol: &str) -> Result<EntryPoint, LinkError>;
}

// ---------------------------------------------------------------------------
// ProcessHost
// ---------------------------------------------------------------------------

static PROCESS_SYMBOLS: Lazy<ProcessHost> = Lazy::new(ProcessHost::new);

/// Register an entry point in the process-wide symbol table.
///
/// Runtimes linked into the same process call this before the first
/// capability request. Registrations made after binding already happened
/// are kept but have no effect on the process-wide facade.
///
/// The entry point runs while the linker is still binding. It must not call
/// back into the facade ([`is_available`](crate::is_available),
/// [`get`](crate::get), [`linker`](crate::linker), ...) or into the linker
/// invoking it: that re-enters the run-once cell and deadlocks or panics.
pub fn register_entry_point<F>(symbol: &str, func: F)
where
    F: Fn(&LinkContext) -> BootstrapResult + Send + Sync + 'static,
{
    PROCESS_SYMBOLS.register(symbol, func);
}

/// Entry points exported by code linked into the current process.
#[derive(Clone, Default)]
pub struct ProcessHost {
    symbols: Arc<RwLock<HashMap<String, EntryPoint>>>,
}

impl ProcessHost {
    /// An isolated, empty symbol table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the process-wide table fed by [`register_entry_point`].
    pub fn global() -> Self {
        (*PROCESS_SYMBOLS).clone()
    }

    pub fn register<F>(&self, symbol: &str, func: F)
    where
        F: Fn(&LinkContext) -> BootstrapResult + Send + Sync + 'static,
    {
        let previous = self
            .symbols
            .write()
            .insert(symbol.to_string(), EntryPoint::new(symbol, func));
        if previous.is_some() {
            log::warn!("Entry point '{}' re-registered, replacing previous", symbol);
        } else {
            log::debug!("Entry point '{}' registered", symbol);
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}

impl fmt::Debug for ProcessHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols: Vec<String> = self.symbols.read().keys().cloned().collect();
        f.debug_struct("ProcessHost")
            .field("symbols", &symbols)
            .finish()
    }
}

impl HostEnvironment for ProcessHost {
    fn describe(&self) -> String {
        format!("process symbol table ({} entries)", self.len())
    }

    fn locate(&self, symbol: &str) -> Result<EntryPoint, LinkError> {
        self.symbols
            .read()
            .get(symbol)
            .cloned()
            .ok_or_else(|| LinkError::not_found(symbol, "no runtime registered in this process"))
    }
}

// ---------------------------------------------------------------------------
// NoHost
// ---------------------------------------------------------------------------

/// An environment that exports nothing (binding disabled).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHost;

impl HostEnvironment for NoHost {
    fn describe(&self) -> String {
        "disabled".to_string()
    }

    fn locate(&self, _symbol: &str) -> Result<EntryPoint, LinkError> {
        Err(LinkError::Disabled)
    }
}
