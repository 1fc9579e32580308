//! Core data types shared by the coordinator, the overlay and the ports
//!
//! Everything in here is plain data: identifiers, the caller identity record
//! produced by a lookup, call states delivered by the host, and the derived
//! presentation tier used to style the overlay.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CallTagError, CallTagResult};

/// Verification tag written by older backends when the phone number was verified
pub const LEGACY_PHONE_VERIFIED_TAG: &str = "PHONEVERIFIED";

/// Phone number of the remote party, as extracted from the incoming call
///
/// Opaque to this crate: it is only used as the lookup key and as display text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Wrap a raw number
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Borrow the raw number
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PhoneNumber {
    fn from(number: String) -> Self {
        Self(number)
    }
}

impl From<&str> for PhoneNumber {
    fn from(number: &str) -> Self {
        Self(number.to_string())
    }
}

/// Caller identity produced by a [`LookupPort`](crate::lookup::LookupPort)
///
/// The verification fields are tri-state: `None` means the backend did not
/// say, which is treated the same as "not verified" when deriving the tier.
///
/// # Examples
///
/// ```rust
/// use calltag_core::types::{IdentityRecord, VisualTier};
///
/// let record = IdentityRecord::new("Jane", "+1555")
///     .with_verified(true)
///     .with_phone_verified(true);
///
/// assert_eq!(VisualTier::from_record(&record), VisualTier::Strong);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// Name shown on the overlay
    #[serde(alias = "name")]
    pub display_name: String,
    /// Number shown on the overlay
    pub phone_number: String,
    /// Whether the customer account is verified
    #[serde(default, alias = "isVerified")]
    pub verified: Option<bool>,
    /// Whether the phone number itself is verified
    #[serde(default, alias = "isPhoneVerified")]
    pub phone_verified: Option<bool>,
    /// Verification method recorded by older backends
    #[serde(default, alias = "oldVerificationMethod")]
    pub legacy_verification_tag: Option<String>,
    /// Free-form note shown under the number
    #[serde(default)]
    pub additional_info: Option<String>,
    /// VIP customers get a marker on the overlay
    #[serde(default)]
    pub is_vip: bool,
}

impl IdentityRecord {
    /// Create a record with no verification information
    pub fn new(display_name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            phone_number: phone_number.into(),
            verified: None,
            phone_verified: None,
            legacy_verification_tag: None,
            additional_info: None,
            is_vip: false,
        }
    }

    /// Set the account verification flag
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    /// Set the phone verification flag
    pub fn with_phone_verified(mut self, phone_verified: bool) -> Self {
        self.phone_verified = Some(phone_verified);
        self
    }

    /// Set the legacy verification tag
    pub fn with_legacy_tag(mut self, tag: impl Into<String>) -> Self {
        self.legacy_verification_tag = Some(tag.into());
        self
    }

    /// Attach a free-form note
    pub fn with_additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    /// Mark the caller as VIP
    pub fn with_vip(mut self, is_vip: bool) -> Self {
        self.is_vip = is_vip;
        self
    }

    /// Decode a record from a lookup backend's JSON payload
    pub fn from_json(json: &str) -> CallTagResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CallTagError::lookup_failure(format!("invalid identity payload: {}", e)))
    }

    /// True when either phone verification signal is present
    pub fn phone_verification_holds(&self) -> bool {
        self.phone_verified == Some(true)
            || self.legacy_verification_tag.as_deref() == Some(LEGACY_PHONE_VERIFIED_TAG)
    }
}

/// State of the call being screened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Ringing, not answered yet
    Ringing,
    /// Answered (off-hook)
    Active,
    /// Hung up or rejected
    Ended,
}

impl CallState {
    /// Whether no further state events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Active | CallState::Ended)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Ringing => write!(f, "RINGING"),
            CallState::Active => write!(f, "ACTIVE"),
            CallState::Ended => write!(f, "ENDED"),
        }
    }
}

/// Direction of a screened call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    /// Remote party is calling us
    Incoming,
    /// We are calling the remote party
    Outgoing,
}

/// Raw call notification handed over by the host's screening hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDetails {
    /// Call direction
    pub direction: CallDirection,
    /// Remote number, if the network provided one
    pub phone_number: Option<PhoneNumber>,
}

impl CallDetails {
    /// Incoming call from `number`
    pub fn incoming(number: impl Into<PhoneNumber>) -> Self {
        Self {
            direction: CallDirection::Incoming,
            phone_number: Some(number.into()),
        }
    }

    /// Outgoing call to `number`
    pub fn outgoing(number: impl Into<PhoneNumber>) -> Self {
        Self {
            direction: CallDirection::Outgoing,
            phone_number: Some(number.into()),
        }
    }
}

/// Unique identifier of one call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Lookup in flight (or returned nothing), no terminal event yet
    Pending,
    /// Overlay visible
    Showing,
    /// Overlay closed by the user or detached by the host; still listening
    Dismissed,
    /// Terminal: overlay removed and unsubscribed
    Done,
}

impl SessionState {
    /// Whether the session has been torn down
    pub fn is_done(&self) -> bool {
        matches!(self, SessionState::Done)
    }
}

/// Trust presentation derived from an [`IdentityRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualTier {
    /// Verified account with a verified phone number
    Strong,
    /// Verified account, phone number not verified
    Partial,
    /// Anything else
    None,
}

impl VisualTier {
    /// Derive the tier for a record
    pub fn from_record(record: &IdentityRecord) -> Self {
        match record.verified {
            Some(true) if record.phone_verification_holds() => VisualTier::Strong,
            Some(true) => VisualTier::Partial,
            _ => VisualTier::None,
        }
    }

    /// Background colour and badge for this tier
    pub fn style(&self) -> TierStyle {
        match self {
            VisualTier::Strong => TierStyle {
                background: OverlayColor::Blue,
                badge: None,
            },
            VisualTier::Partial => TierStyle {
                background: OverlayColor::Yellow,
                badge: Some(Badge::PartiallyVerified),
            },
            VisualTier::None => TierStyle {
                background: OverlayColor::Red,
                badge: Some(Badge::Unverified),
            },
        }
    }
}

/// Overlay background colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayColor {
    Blue,
    Yellow,
    Red,
}

/// Badge icon replacing the default verified mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Badge {
    PartiallyVerified,
    Unverified,
}

/// Presentation selected by a [`VisualTier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStyle {
    /// Background colour
    pub background: OverlayColor,
    /// Badge override, `None` keeps the layout's default mark
    pub badge: Option<Badge>,
}

/// Surface position in host pixels, relative to the configured gravity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Host layout resource used to inflate the overlay
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutId(pub String);

impl LayoutId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
