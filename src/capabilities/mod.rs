//! # Capabilities
//!
//! A capability is a named, requestable unit of optional functionality,
//! represented on the client side by a trait. The hosting runtime decides at
//! run time whether it can provide an implementation.
//!
//! ## Identifiers and typing
//!
//! Every capability has a stable, fully-qualified [`CapabilityId`]
//! (e.g. `hostcaps.WindowDecorations`). Client code rarely spells identifiers
//! out: it declares a trait and ties it to its identifier with
//! [`declare_capability!`](crate::declare_capability), then asks for it by type:
//!
//! ```rust
//! use std::sync::Arc;
//! use hostcaps::declare_capability;
//!
//! pub trait Beeper: Send + Sync {
//!     fn beep(&self);
//! }
//!
//! declare_capability!(dyn Beeper => "example.Beeper");
//!
//! let beeper: Option<Arc<dyn Beeper>> = hostcaps::get::<dyn Beeper>();
//! match beeper {
//!     Some(b) => b.beep(),
//!     None => { /* plan B */ }
//! }
//! ```
//!
//! On the wire between client and runtime an instance travels as a
//! [`CapabilityInstance`]: a type-erased `Arc` whose payload is the typed
//! `Arc<T>`. Typed accessors downcast it back.

pub mod registry;
pub mod version;

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use registry::{KnownCapabilities, KNOWN_PROXIES, KNOWN_SERVICES};
pub use version::{ApiVersion, API_VERSION};

/// Stable, fully-qualified name of one requestable interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(Cow<'static, str>);

impl CapabilityId {
    /// Identifier backed by a static string (no allocation).
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Identifier from an owned or borrowed name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Identifier of the capability type `T`.
    pub fn of<T: Capability + ?Sized>() -> Self {
        Self::from_static(T::ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last dotted segment (`hostcaps.WindowMove` → `WindowMove`).
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for CapabilityId {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl AsRef<str> for CapabilityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Category of a known capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Plain service implemented entirely by the runtime.
    Service,
    /// Proxy-backed service: the runtime hands out a proxy that may call
    /// back into client-provided objects.
    Proxy,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => f.write_str("service"),
            Self::Proxy => f.write_str("proxy"),
        }
    }
}

/// Type-erased capability instance as exchanged with the runtime.
///
/// The payload is always an `Arc<T>` for the capability type `T`; see
/// [`CapabilityInstance::new`] and [`CapabilityInstance::downcast`].
#[derive(Clone)]
pub struct CapabilityInstance(Arc<dyn Any + Send + Sync>);

impl CapabilityInstance {
    /// Wrap a typed implementation of capability `T`.
    pub fn new<T: Capability + ?Sized>(value: Arc<T>) -> Self {
        Self(Arc::new(value))
    }

    /// Recover the typed capability, or `None` when the payload is not an
    /// `Arc<T>`.
    pub fn downcast<T: Capability + ?Sized>(&self) -> Option<Arc<T>> {
        self.0.downcast_ref::<Arc<T>>().cloned()
    }

    /// Whether two handles share the same payload allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CapabilityInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapabilityInstance").field(&"<dyn Any>").finish()
    }
}

/// Binds a client-side capability type to its identifier.
///
/// Implemented for trait-object types (`dyn Trait`), usually through
/// [`declare_capability!`](crate::declare_capability).
pub trait Capability: Send + Sync + 'static {
    /// Fully-qualified identifier requested from the runtime.
    const ID: &'static str;

    /// Category of the capability.
    const KIND: CapabilityKind = CapabilityKind::Service;
}

/// Implement [`Capability`] for a trait-object type.
///
/// ```rust
/// # use hostcaps::declare_capability;
/// pub trait Clipboard: Send + Sync {}
/// pub trait DropHandler: Send + Sync {}
///
/// declare_capability!(dyn Clipboard => "example.Clipboard");
/// declare_capability!(dyn DropHandler => "example.DropHandler", proxy);
/// ```
#[macro_export]
macro_rules! declare_capability {
    ($ty:ty => $id:literal) => {
        impl $crate::capabilities::Capability for $ty {
            const ID: &'static str = $id;
        }
    };
    ($ty:ty => $id:literal, proxy) => {
        impl $crate::capabilities::Capability for $ty {
            const ID: &'static str = $id;
            const KIND: $crate::capabilities::CapabilityKind =
                $crate::capabilities::CapabilityKind::Proxy;
        }
    };
}
