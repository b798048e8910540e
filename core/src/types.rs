//! Domain types for event registration.
//!
//! The types here are shared by every store implementation and by the HTTP surface.
//! Cross-store references are id-based only: a registration row or an
//! [`InteractionRecord`] refers to its event through an [`EventId`], never through
//! an in-memory pointer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of an authenticated user.
///
/// Issued by the external identity provider; opaque to this system.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identity-provider subject.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation identifier of one logical register/unregister request.
///
/// The settlement consumer deduplicates on this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Creates a new random `CorrelationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `CorrelationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an interaction log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionId(Uuid);

impl InteractionId {
    /// Creates a new random `InteractionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `InteractionId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InteractionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event (owned by the capacity ledger)
// ============================================================================

/// Capacity used when an event is created without an explicit spot count.
pub const DEFAULT_TOTAL_SPOTS: u32 = 100;

/// An event as held by the capacity ledger.
///
/// Invariant: `registered_count <= total_spots`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Where the event takes place
    pub location: String,
    /// When the event takes place (as supplied by the organizer)
    pub date: String,
    /// Organizer reference (identity-provider user id)
    pub organizer_id: UserId,
    /// Maximum number of active registrations
    pub total_spots: u32,
    /// Current number of active registrations
    pub registered_count: u32,
}

impl Event {
    /// Spots still available for registration.
    #[must_use]
    pub const fn available_spots(&self) -> u32 {
        self.total_spots.saturating_sub(self.registered_count)
    }

    /// Whether another registration would exceed capacity.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.registered_count >= self.total_spots
    }
}

/// Input for creating an event in the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Where the event takes place
    #[serde(default)]
    pub location: String,
    /// When the event takes place
    #[serde(default)]
    pub date: String,
    /// Organizer reference
    pub organizer_id: UserId,
    /// Maximum number of active registrations
    #[serde(default = "default_total_spots")]
    pub total_spots: u32,
}

const fn default_total_spots() -> u32 {
    DEFAULT_TOTAL_SPOTS
}

impl NewEvent {
    /// Minimal event definition with the default capacity.
    #[must_use]
    pub fn new(name: impl Into<String>, organizer_id: UserId) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            location: String::new(),
            date: String::new(),
            organizer_id,
            total_spots: DEFAULT_TOTAL_SPOTS,
        }
    }

    /// Override the capacity.
    #[must_use]
    pub const fn with_total_spots(mut self, total_spots: u32) -> Self {
        self.total_spots = total_spots;
        self
    }

    /// Build the ledger record for this definition with a zero registered count.
    #[must_use]
    pub fn into_event(self, id: EventId) -> Event {
        Event {
            id,
            name: self.name,
            description: self.description,
            location: self.location,
            date: self.date,
            organizer_id: self.organizer_id,
            total_spots: self.total_spots,
            registered_count: 0,
        }
    }
}

// ============================================================================
// Registration (owned by the capacity ledger)
// ============================================================================

/// Lifecycle status of a registration row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// The user currently holds a spot
    Active,
    /// The user held a spot and gave it back
    Released,
}

impl RegistrationStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Released => "released",
        }
    }

    /// Parse the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "released" => Some(Self::Released),
            _ => None,
        }
    }
}

// ============================================================================
// Interaction log and settlement messages
// ============================================================================

/// What a user did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationAction {
    /// Took a spot
    Register,
    /// Gave a spot back
    Unregister,
}

impl RegistrationAction {
    /// Lowercase form stored in the interaction log.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Unregister => "unregister",
        }
    }

    /// Parse the lowercase interaction-log form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "register" => Some(Self::Register),
            "unregister" => Some(Self::Unregister),
            _ => None,
        }
    }
}

impl fmt::Display for RegistrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => f.write_str("Register"),
            Self::Unregister => f.write_str("Unregister"),
        }
    }
}

/// Append-only audit entry in the interaction log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    /// Entry identifier
    pub id: InteractionId,
    /// Event the action targeted
    pub event_id: EventId,
    /// Acting user
    pub user_id: UserId,
    /// Register or unregister
    pub action: RegistrationAction,
    /// When the action was accepted
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    /// Create a record with a fresh id.
    #[must_use]
    pub fn new(
        event_id: EventId,
        user_id: UserId,
        action: RegistrationAction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InteractionId::new(),
            event_id,
            user_id,
            action,
            timestamp,
        }
    }
}

/// Net registration count for one event, as aggregated from the interaction log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistrationCount {
    /// Event identifier
    pub event_id: EventId,
    /// Register actions minus unregister actions
    pub registrations: u64,
}

/// Message published to the ordered channel for asynchronous settlement.
///
/// Wire form (JSON, camelCase):
///
/// ```json
/// { "eventId": "…", "userId": "…", "action": "Register",
///   "correlationId": "…", "timestamp": "2025-01-01T00:00:00Z" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementIntent {
    /// Event identifier, also the session key
    pub event_id: EventId,
    /// Acting user
    pub user_id: UserId,
    /// Register or unregister
    pub action: RegistrationAction,
    /// Unique per logical request
    pub correlation_id: CorrelationId,
    /// When the intent was issued
    pub timestamp: DateTime<Utc>,
}

impl SettlementIntent {
    /// The session key that orders this message relative to others.
    #[must_use]
    pub fn session_key(&self) -> String {
        self.event_id.to_string()
    }

    /// Serialize to the JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse the JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid intent.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::TimeZone;

    #[test]
    fn settlement_intent_uses_documented_wire_format() {
        let event_id: EventId = "6f9619ff-8b86-d011-b42d-00cf4fc964ff".parse().unwrap();
        let intent = SettlementIntent {
            event_id,
            user_id: UserId::new("user-1"),
            action: RegistrationAction::Unregister,
            correlation_id: CorrelationId::from_uuid(Uuid::nil()),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        };

        let json: serde_json::Value = serde_json::from_slice(&intent.to_json().unwrap()).unwrap();

        assert_eq!(json["eventId"], "6f9619ff-8b86-d011-b42d-00cf4fc964ff");
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["action"], "Unregister");
        assert_eq!(json["correlationId"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["timestamp"], "2025-01-01T00:00:00Z");
        assert_eq!(intent.session_key(), event_id.to_string());
    }

    #[test]
    fn available_spots_never_underflows() {
        let mut event = NewEvent::new("Meetup", UserId::new("org")).with_total_spots(2).into_event(EventId::new());
        assert_eq!(event.available_spots(), 2);
        assert!(!event.is_full());

        event.registered_count = 2;
        assert_eq!(event.available_spots(), 0);
        assert!(event.is_full());
    }

    #[test]
    fn new_event_defaults_capacity_when_omitted() {
        let parsed: NewEvent =
            serde_json::from_str(r#"{"name":"Workshop","organizerId":"org-7"}"#).unwrap();
        assert_eq!(parsed.total_spots, DEFAULT_TOTAL_SPOTS);
        assert_eq!(parsed.organizer_id, UserId::new("org-7"));
    }

    #[test]
    fn action_string_forms() {
        assert_eq!(RegistrationAction::Register.as_str(), "register");
        assert_eq!(RegistrationAction::parse("unregister"), Some(RegistrationAction::Unregister));
        assert_eq!(RegistrationAction::parse("Register"), None);
        assert_eq!(RegistrationStatus::parse("released"), Some(RegistrationStatus::Released));
    }
}
