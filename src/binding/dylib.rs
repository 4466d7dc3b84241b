//! Hosting environment backed by a shared library.
//!
//! The library must export two symbols, both produced by
//! [`export_entry_point!`](crate::export_entry_point):
//!
//! - `HOSTCAPS_ABI_VERSION: u32`, compared against [`ABI_VERSION`]
//! - the entry point itself, `fn(&LinkContext) -> BootstrapResult`
//!
//! The entry point uses the Rust ABI, so the runtime library has to be built
//! with the same compiler as the client. The ABI marker catches contract
//! changes, not compiler mismatches.

use std::path::{Path, PathBuf};

use libloading::Library;

use super::error::LinkError;
use super::host::{BootstrapResult, EntryPoint, HostEnvironment, LinkContext, ABI_VERSION};

/// Symbol holding the exporter's contract revision.
pub const ABI_VERSION_SYMBOL: &str = "HOSTCAPS_ABI_VERSION";

type RawEntryPoint = fn(&LinkContext) -> BootstrapResult;

/// A shared library that may export the entry point.
#[derive(Debug, Clone)]
pub struct DylibHost {
    path: PathBuf,
}

impl DylibHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HostEnvironment for DylibHost {
    fn describe(&self) -> String {
        format!("shared library {}", self.path.display())
    }

    fn locate(&self, symbol: &str) -> Result<EntryPoint, LinkError> {
        // SAFETY: loading runs the library's initializers; the library is
        // chosen by configuration and trusted like any linked dependency.
        let library = unsafe { Library::new(&self.path) }.map_err(|e| {
            LinkError::not_found(symbol, format!("cannot open {}: {}", self.path.display(), e))
        })?;

        // SAFETY: the marker is declared as a `u32` static by the exporter.
        let abi = unsafe {
            library
                .get::<*const u32>(ABI_VERSION_SYMBOL.as_bytes())
                .map(|marker| **marker)
        }
        .map_err(|e| {
            LinkError::incompatible(symbol, format!("missing {}: {}", ABI_VERSION_SYMBOL, e))
        })?;
        if abi != ABI_VERSION {
            return Err(LinkError::incompatible(
                symbol,
                format!("library ABI {} does not match client ABI {}", abi, ABI_VERSION),
            ));
        }

        // SAFETY: the ABI marker matched, so the symbol has the declared type.
        let raw: RawEntryPoint = unsafe { library.get::<RawEntryPoint>(symbol.as_bytes()) }
            .map(|func| *func)
            .map_err(|e| LinkError::not_found(symbol, e.to_string()))?;

        log::debug!("Resolved '{}' in {}", symbol, self.path.display());

        // Handles and instances handed out by the runtime point into the
        // library's code, so it stays mapped for the rest of the process.
        std::mem::forget(library);
        Ok(EntryPoint::new(symbol, move |ctx: &LinkContext| raw(ctx)))
    }
}

/// Export a bootstrap function from a runtime `cdylib`.
///
/// ```rust,ignore
/// fn bootstrap(ctx: &hostcaps::LinkContext) -> hostcaps::BootstrapResult {
///     Ok(Box::new(my_table().into_lookup(ctx)))
/// }
/// hostcaps::export_entry_point!(bootstrap);
/// ```
///
/// `bootstrap` runs while the client is still binding and must not call the
/// client's facade functions; see [`register_entry_point`](crate::register_entry_point).
#[macro_export]
macro_rules! export_entry_point {
    ($func:path) => {
        #[no_mangle]
        pub static HOSTCAPS_ABI_VERSION: u32 = $crate::binding::host::ABI_VERSION;

        #[no_mangle]
        pub fn hostcaps_bootstrap(
            ctx: &$crate::binding::host::LinkContext,
        ) -> $crate::binding::host::BootstrapResult {
            $func(ctx)
        }
    };
}
