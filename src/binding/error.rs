//! Binding errors.
//!
//! Two families with very different fates:
//! - [`LinkError`] means the hosting environment does not offer this layer
//!   (or offers an incompatible one). It is recoverable and only ever shows
//!   up as "not available".
//! - [`BindingFault`] means the entry point was found and invoked but the
//!   implementation itself failed. It is fatal for the process.

use thiserror::Error;

/// The hosting environment cannot be linked against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The environment does not export the entry point at all.
    #[error("Entry point '{symbol}' not found: {detail}")]
    NotFound { symbol: String, detail: String },

    /// The entry point exists but cannot be invoked with the expected
    /// contract (visibility, signature or ABI mismatch).
    #[error("Entry point '{symbol}' is incompatible: {detail}")]
    Incompatible { symbol: String, detail: String },

    /// Binding was switched off by configuration.
    #[error("Capability binding disabled by configuration")]
    Disabled,
}

impl LinkError {
    pub fn not_found(symbol: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NotFound {
            symbol: symbol.into(),
            detail: detail.into(),
        }
    }

    pub fn incompatible(symbol: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Incompatible {
            symbol: symbol.into(),
            detail: detail.into(),
        }
    }
}

/// Failure reported by a runtime's entry point while bootstrapping.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BootstrapError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BootstrapError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// The hosting environment is present but broken.
///
/// Cloneable so that every caller observing the faulted state gets the same
/// diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingFault {
    /// The entry point returned an error.
    #[error("Capability runtime failed to bootstrap via '{symbol}': {message}")]
    Bootstrap { symbol: String, message: String },

    /// The entry point panicked.
    #[error("Capability runtime panicked in '{symbol}': {message}")]
    Panicked { symbol: String, message: String },
}

impl BindingFault {
    pub(crate) fn from_bootstrap(symbol: &str, err: &BootstrapError) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Bootstrap {
            symbol: symbol.to_string(),
            message,
        }
    }

    pub(crate) fn from_panic(symbol: &str, payload: &(dyn std::any::Any + Send)) -> Self {
        Self::Panicked {
            symbol: symbol.to_string(),
            message: panic_message(payload),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
