//! Process-wide lookup registry
//!
//! Holds the [`LookupPort`] configured by the host application together with
//! an optional overlay layout override. The host configures it once at
//! startup (reconfiguration is allowed, the latest value wins) and every call
//! session reads it when it starts.
//!
//! Each configuration is published as one immutable [`RegistryEntry`] behind
//! an `Arc`, so a reader racing a writer sees either the whole old entry or
//! the whole new one.
//!
//! # Examples
//!
//! ```rust
//! use calltag_core::lookup::DirectoryLookup;
//! use calltag_core::registry::LookupRegistry;
//! use calltag_core::types::LayoutId;
//! use std::sync::Arc;
//!
//! let registry = LookupRegistry::new();
//! assert!(registry.snapshot().is_none());
//!
//! registry.configure(Arc::new(DirectoryLookup::new()), Some(LayoutId::new("branded_popup")));
//! let entry = registry.snapshot().unwrap();
//! assert_eq!(entry.layout_override, Some(LayoutId::new("branded_popup")));
//! ```

use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::error::{CallTagError, CallTagResult};
use crate::lookup::LookupPort;
use crate::types::LayoutId;

/// Global registry instance
static GLOBAL_REGISTRY: OnceLock<Arc<LookupRegistry>> = OnceLock::new();

/// One published configuration
pub struct RegistryEntry {
    /// Lookup port used by new sessions
    pub lookup_port: Arc<dyn LookupPort>,
    /// Layout replacing the host default, if any
    pub layout_override: Option<LayoutId>,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("layout_override", &self.layout_override)
            .finish_non_exhaustive()
    }
}

/// Read-mostly slot with the host's lookup configuration
#[derive(Debug, Default)]
pub struct LookupRegistry {
    entry: RwLock<Option<Arc<RegistryEntry>>>,
}

impl LookupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new configuration, replacing any previous one
    pub fn configure(&self, lookup_port: Arc<dyn LookupPort>, layout_override: Option<LayoutId>) {
        let entry = Arc::new(RegistryEntry {
            lookup_port,
            layout_override,
        });
        let replaced = self.entry.write().replace(entry).is_some();
        info!(
            "Lookup registry {}",
            if replaced { "reconfigured" } else { "configured" }
        );
    }

    /// Current configuration, if any
    pub fn snapshot(&self) -> Option<Arc<RegistryEntry>> {
        self.entry.read().clone()
    }

    /// Current configuration, or [`CallTagError::LookupPortUnconfigured`]
    pub fn require(&self) -> CallTagResult<Arc<RegistryEntry>> {
        self.snapshot().ok_or(CallTagError::LookupPortUnconfigured)
    }

    /// Whether a lookup port has been configured
    pub fn is_configured(&self) -> bool {
        self.entry.read().is_some()
    }

    /// Drop the current configuration
    pub fn clear(&self) {
        self.entry.write().take();
    }
}

/// The process-wide registry
pub fn global() -> Arc<LookupRegistry> {
    GLOBAL_REGISTRY
        .get_or_init(|| Arc::new(LookupRegistry::new()))
        .clone()
}

/// Host configuration entry point: register the lookup port for this process
pub fn configure(lookup_port: Arc<dyn LookupPort>, layout_override: Option<LayoutId>) {
    global().configure(lookup_port, layout_override);
}
