//! Known capability set — the identifiers this client build can request.
//!
//! The set is fixed when the crate is built and never changes at run time.
//! It is handed to the runtime inside the link context so the runtime can
//! refuse identifiers the client does not know about and decide which
//! implementation generation to bind. The client itself does not filter
//! requests through it.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::Serialize;

use super::{CapabilityId, CapabilityKind};

/// Plain services, in declaration order.
pub const KNOWN_SERVICES: &[&str] = &[
    "hostcaps.DesktopActions",
    "hostcaps.FontExtensions",
    "hostcaps.Keyboard",
    "hostcaps.RoundedCorners",
    "hostcaps.WindowDecorations",
    "hostcaps.WindowMove",
];

/// Proxy-backed services, in declaration order.
pub const KNOWN_PROXIES: &[&str] = &[
    "hostcaps.DesktopActions.Handler",
    "hostcaps.WindowDecorations.CustomTitleBar",
];

static CLIENT: Lazy<KnownCapabilities> =
    Lazy::new(|| KnownCapabilities::new(KNOWN_SERVICES, KNOWN_PROXIES));

/// Read-only view over two disjoint, ordered identifier lists.
#[derive(Debug, Clone, Serialize)]
pub struct KnownCapabilities {
    services: &'static [&'static str],
    proxies: &'static [&'static str],
    #[serde(skip)]
    index: HashSet<&'static str>,
}

impl KnownCapabilities {
    /// Build a set from explicit lists.
    ///
    /// An identifier listed under both categories is kept as a service.
    pub fn new(services: &'static [&'static str], proxies: &'static [&'static str]) -> Self {
        let mut index = HashSet::with_capacity(services.len() + proxies.len());
        index.extend(services.iter().copied());
        for id in proxies {
            if !index.insert(*id) {
                log::warn!("Capability {} is declared both as service and proxy", id);
            }
        }
        Self {
            services,
            proxies,
            index,
        }
    }

    /// The set embedded in this client build.
    pub fn client() -> &'static KnownCapabilities {
        &CLIENT
    }

    pub fn services(&self) -> &'static [&'static str] {
        self.services
    }

    pub fn proxies(&self) -> &'static [&'static str] {
        self.proxies
    }

    /// Whether `id` is known in either category.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Category of a known identifier.
    pub fn kind_of(&self, id: &str) -> Option<CapabilityKind> {
        if self.services.iter().any(|s| *s == id) {
            Some(CapabilityKind::Service)
        } else if self.proxies.iter().any(|s| *s == id) {
            Some(CapabilityKind::Proxy)
        } else {
            None
        }
    }

    /// All identifiers: services first, then proxies.
    pub fn iter(&self) -> impl Iterator<Item = (CapabilityId, CapabilityKind)> + '_ {
        self.services
            .iter()
            .map(|id| (CapabilityId::from_static(*id), CapabilityKind::Service))
            .chain(
                self.proxies
                    .iter()
                    .filter(|id| !self.services.contains(*id))
                    .map(|id| (CapabilityId::from_static(*id), CapabilityKind::Proxy)),
            )
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
