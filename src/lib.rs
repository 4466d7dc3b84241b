//! # hostcaps
//!
//! Dynamic capability discovery and binding between a client module and the
//! hosting runtime it happens to run on.
//!
//! The client declares a set of interfaces ("capabilities") it may want
//! implemented. A separate, independently versioned runtime may or may not
//! provide implementations. This crate finds the runtime's entry point at
//! run time, binds to it once, caches what it hands out, and makes absence a
//! normal, typed outcome.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use hostcaps::declare_capability;
//!
//! pub trait WindowMove: Send + Sync {
//!     fn start_move(&self, window: u64);
//! }
//! declare_capability!(dyn WindowMove => "hostcaps.WindowMove");
//!
//! struct ManualMove;
//! impl WindowMove for ManualMove {
//!     fn start_move(&self, _window: u64) {}
//! }
//!
//! if hostcaps::is_supported::<dyn WindowMove>() {
//!     // native implementation from the runtime
//! }
//!
//! let mover = hostcaps::get_or_else::<dyn WindowMove, _, std::convert::Infallible>(|| {
//!     Ok(Arc::new(ManualMove))
//! });
//! assert!(mover.is_some());
//! ```
//!
//! ## Components
//!
//! - [`capabilities`] — identifiers, the known capability set, API version
//! - [`binding`] — hosting environments and the one-shot resolver
//! - [`lookup`] — the handle contract the runtime implements
//! - [`facade`] — [`CapabilityLinker`] and the process-wide linker
//! - [`runtime`] — helper for runtimes implementing the entry point
//! - [`config`] — selects the hosting environment

pub mod binding;
pub mod capabilities;
pub mod config;
pub mod facade;
pub mod lookup;
pub mod runtime;

pub use binding::{
    register_entry_point, BindingFault, BindingState, BootstrapError, BootstrapResult,
    HostEnvironment, LinkContext, LinkError, NoHost, ProcessHost, ENTRY_POINT_SYMBOL,
};
#[cfg(feature = "dylib")]
pub use binding::DylibHost;
pub use capabilities::{
    ApiVersion, Capability, CapabilityId, CapabilityInstance, CapabilityKind, KnownCapabilities,
    API_VERSION,
};
pub use config::LinkConfig;
pub use facade::{
    api_version, get, get_or_else, is_available, is_supported, linker, try_linker, BindingReport,
    CapabilityLinker, CapabilitySupport,
};
pub use lookup::ServiceLookup;
