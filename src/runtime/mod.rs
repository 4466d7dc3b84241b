//! # Runtime side
//!
//! Helper for hosting environments that implement the capability layer.
//! A runtime declares which capabilities it can provide in a
//! [`ServiceTable`] and turns it into the [`ServiceLookup`] handle its entry
//! point returns:
//!
//! ```rust
//! use std::sync::Arc;
//! use hostcaps::runtime::ServiceTable;
//! use hostcaps::{declare_capability, LinkContext};
//!
//! pub trait WindowMove: Send + Sync {
//!     fn start_move(&self, window: u64);
//! }
//! declare_capability!(dyn WindowMove => "hostcaps.WindowMove");
//!
//! struct NativeMove;
//! impl WindowMove for NativeMove {
//!     fn start_move(&self, _window: u64) {}
//! }
//!
//! let table = ServiceTable::new()
//!     .service::<dyn WindowMove, _>(|| Some(Arc::new(NativeMove) as Arc<dyn WindowMove>));
//! let lookup = table.into_lookup(&LinkContext::client());
//! # let _ = lookup;
//! ```
//!
//! The handle only serves identifiers the client declared in its known set,
//! with the category it declared them under. Anything else is reported as
//! unsupported, so a newer runtime never hands a client an interface it was
//! not built to understand.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::capabilities::{
    Capability, CapabilityId, CapabilityInstance, CapabilityKind, KnownCapabilities,
};
use crate::binding::host::LinkContext;
use crate::lookup::ServiceLookup;

type Factory = Box<dyn Fn() -> Option<CapabilityInstance> + Send + Sync>;

struct Entry {
    kind: CapabilityKind,
    factory: Factory,
}

/// Capabilities a runtime is able to provide, keyed by identifier.
#[derive(Default)]
pub struct ServiceTable {
    entries: HashMap<CapabilityId, Entry>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide a plain service. The factory may decline by returning `None`
    /// (e.g. when the platform lacks the feature).
    pub fn service<T, F>(self, factory: F) -> Self
    where
        T: Capability + ?Sized,
        F: Fn() -> Option<Arc<T>> + Send + Sync + 'static,
    {
        self.insert::<T, F>(CapabilityKind::Service, factory)
    }

    /// Provide a proxy-backed service.
    pub fn proxy<T, F>(self, factory: F) -> Self
    where
        T: Capability + ?Sized,
        F: Fn() -> Option<Arc<T>> + Send + Sync + 'static,
    {
        self.insert::<T, F>(CapabilityKind::Proxy, factory)
    }

    fn insert<T, F>(mut self, kind: CapabilityKind, factory: F) -> Self
    where
        T: Capability + ?Sized,
        F: Fn() -> Option<Arc<T>> + Send + Sync + 'static,
    {
        if kind != T::KIND {
            log::warn!(
                "Capability {} declared as {} but registered as {}",
                T::ID,
                T::KIND,
                kind
            );
        }
        self.entries.insert(
            CapabilityId::of::<T>(),
            Entry {
                kind,
                factory: Box::new(move || factory().map(CapabilityInstance::new)),
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Known client identifiers this table has no implementation for.
    pub fn unimplemented(&self, known: &KnownCapabilities) -> Vec<CapabilityId> {
        known
            .iter()
            .filter(|(id, _)| !self.entries.contains_key(id))
            .map(|(id, _)| id)
            .collect()
    }

    /// Bind the table to a client's link context.
    pub fn into_lookup(self, ctx: &LinkContext) -> TableLookup {
        let missing = self.unimplemented(ctx.known);
        if !missing.is_empty() {
            log::debug!(
                "Runtime provides {} of {} client capabilities; missing: {:?}",
                ctx.known.len() - missing.len(),
                ctx.known.len(),
                missing
            );
        }
        TableLookup {
            known: ctx.known,
            entries: self
                .entries
                .into_iter()
                .map(|(id, entry)| (id, (entry, OnceCell::new())))
                .collect(),
        }
    }
}

impl fmt::Debug for ServiceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&CapabilityId> = self.entries.keys().collect();
        ids.sort();
        f.debug_struct("ServiceTable").field("entries", &ids).finish()
    }
}

/// [`ServiceLookup`] over a [`ServiceTable`], validated against one client.
///
/// Each factory runs at most once; its result, including a decline, is
/// memoized.
pub struct TableLookup {
    known: &'static KnownCapabilities,
    entries: HashMap<CapabilityId, (Entry, OnceCell<Option<CapabilityInstance>>)>,
}

impl ServiceLookup for TableLookup {
    fn get_service(&self, id: &CapabilityId) -> Option<CapabilityInstance> {
        let Some(declared) = self.known.kind_of(id.as_str()) else {
            log::debug!("Refusing {}: not in the client's known capability set", id);
            return None;
        };
        let (entry, cell) = self.entries.get(id)?;
        if entry.kind != declared {
            log::warn!(
                "Refusing {}: client expects a {}, runtime provides a {}",
                id,
                declared,
                entry.kind
            );
            return None;
        }
        cell.get_or_init(|| (entry.factory)()).clone()
    }
}

impl fmt::Debug for TableLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableLookup")
            .field("entries", &self.entries.len())
            .finish()
    }
}
