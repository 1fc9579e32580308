//! # calltag-core - Caller identity overlay coordinator
//!
//! When a call comes in, this crate looks the caller up through a host
//! supplied [`LookupPort`](lookup::LookupPort) and, if the caller is known and
//! the phone is still ringing, shows a draggable overlay with their identity.
//! The overlay and the call-state listener are released exactly once, whatever
//! order the lookup result and the call-state notifications arrive in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use calltag_core::{registry, CallSessionCoordinator};
//! use calltag_core::call_state::BroadcastCallStateSource;
//! use calltag_core::logging::{setup_logging, LoggingConfig};
//! use calltag_core::lookup::FnLookupPort;
//! use calltag_core::overlay::HeadlessHost;
//! use calltag_core::types::{CallDetails, CallState, IdentityRecord, PhoneNumber};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     setup_logging(&LoggingConfig::from_level("info")?)?;
//!
//!     // Once at startup: tell the coordinator how to identify callers
//!     registry::configure(
//!         Arc::new(FnLookupPort::new(|number: PhoneNumber| async move {
//!             Ok(Some(IdentityRecord::new("Jane", number.as_str()).with_verified(true)))
//!         })),
//!         None,
//!     );
//!
//!     let telephony = Arc::new(BroadcastCallStateSource::new());
//!     let coordinator = CallSessionCoordinator::builder()
//!         .call_state_source(telephony.clone())
//!         .overlay_host(Arc::new(HeadlessHost::new()))
//!         .build()?;
//!
//!     // From the platform's call screening hook
//!     let session = coordinator.screen_call(CallDetails::incoming("+1555"))?;
//!
//!     // From the platform's call state callback
//!     telephony.publish(CallState::Active);
//!
//!     if let Some(session) = session {
//!         session.wait_done().await;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`registry`]: process-wide lookup configuration
//! - [`coordinator`]: creates one session per incoming call
//! - [`session`]: the per-call actor that owns state, overlay and subscription
//! - [`overlay`]: surface management and drag handling
//! - [`call_state`] and [`lookup`]: the two external collaborators

pub mod builder;
pub mod call_state;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logging;
pub mod lookup;
pub mod overlay;
pub mod registry;
pub mod session;
pub mod types;

// Re-export main types
pub use builder::CoordinatorBuilder;
pub use config::{CoordinatorConfig, OverlayConfig};
pub use coordinator::CallSessionCoordinator;
pub use error::{CallTagError, CallTagResult};
pub use events::{EventStream, HideReason, SessionEvent};
pub use session::SessionHandle;
pub use types::{CallState, IdentityRecord, PhoneNumber, SessionState, VisualTier};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
