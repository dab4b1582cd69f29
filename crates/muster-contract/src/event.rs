use serde::{Deserialize, Serialize};

/// The single active (or absent) event for a tenant.
///
/// An empty `name` is the sentinel for "no event scheduled"; the unscheduled
/// state is encoded entirely in that field. Attendee order is significant and
/// controls display numbering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub venue: String,
    #[serde(rename = "dateTime")]
    pub start_unix_ms: u64,
    pub attendees: Vec<String>,
    pub creator: String,
}

impl Event {
    /// The empty value that represents "nothing scheduled".
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_scheduled(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn has_attendee(&self, user_id: &str) -> bool {
        self.attendees.iter().any(|entry| entry == user_id)
    }
}

/// Bot identity stored alongside the event so a tenant can be respawned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCredentials {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "createdBy")]
    pub created_by: String,
}

/// Durable per-tenant record; the persistence gateway is the system of record
/// and in-memory session state is a write-through cache of this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub id: String,
    #[serde(rename = "activeEvent")]
    pub active_event: Event,
    pub bot: BotCredentials,
}
