//! # Binding
//!
//! Connects the client to whatever capability runtime the hosting
//! environment provides, exactly once per [`CapabilityLinker`](crate::CapabilityLinker).
//!
//! ## Resolution flow
//!
//! 1. A [`HostEnvironment`] is asked for [`ENTRY_POINT_SYMBOL`]
//! 2. Missing or incompatible entry point → [`BindingState::Unsupported`]
//! 3. Entry point invoked with the client's [`LinkContext`]
//! 4. Returned handle → [`BindingState::Bound`]; returned error or panic →
//!    [`BindingState::Faulted`]
//!
//! Hosting environments:
//! - [`ProcessHost`] — runtimes linked into the process register their entry
//!   point with [`register_entry_point`]
//! - `DylibHost` (feature `dylib`) — entry point exported by a shared library
//! - [`NoHost`] — binding switched off

#[cfg(feature = "dylib")]
pub mod dylib;
pub mod error;
pub mod host;
pub mod resolver;

#[cfg(feature = "dylib")]
pub use dylib::DylibHost;
pub use error::{BindingFault, BootstrapError, LinkError};
pub use host::{
    register_entry_point, BootstrapResult, EntryPoint, HostEnvironment, LinkContext, NoHost,
    ProcessHost, ABI_VERSION, ENTRY_POINT_SYMBOL,
};
pub use resolver::{resolve, BindingState};
