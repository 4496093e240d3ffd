//! Chat messages exchanged between the end-user and admins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AdminId, IdError, MessageId, ParticipantId, UserId, document_id};

/// Which side of the conversation sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SenderType {
    /// The end-user running this client.
    #[serde(rename = "User", alias = "user")]
    User,
    /// A support-staff account.
    #[serde(rename = "superadmin", alias = "Admin", alias = "admin", alias = "SuperAdmin")]
    Admin,
}

impl SenderType {
    /// Returns true for messages sent from the admin side.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// A single chat message.
///
/// Immutable once created. Conversations are ordered by `created_at`
/// ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireMessage")]
pub struct Message {
    /// Message id.
    #[serde(rename = "_id")]
    pub id: MessageId,
    /// Account that sent the message.
    pub sender_id: ParticipantId,
    /// Which side sent the message.
    pub sender_type: SenderType,
    /// Account that receives the message.
    pub receiver_id: ParticipantId,
    /// Message body.
    pub content: String,
    /// When the backend stored the message.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this message belongs to the conversation between `user` and `admin`.
    ///
    /// The pair is unordered: either side may be the sender.
    #[must_use]
    pub fn is_between(&self, user: &UserId, admin: &AdminId) -> bool {
        let sender = self.sender_id.as_str();
        let receiver = self.receiver_id.as_str();
        (sender == user.as_str() && receiver == admin.as_str())
            || (sender == admin.as_str() && receiver == user.as_str())
    }

    /// Returns true if the message was sent by the admin side.
    #[must_use]
    pub const fn is_from_admin(&self) -> bool {
        self.sender_type.is_admin()
    }
}

/// Select the conversation between `user` and `admin` from a full message set.
///
/// The result is stably sorted by `created_at`, so messages the backend
/// returned in chronological order keep their relative positions.
#[must_use]
pub fn conversation_with(messages: &[Message], user: &UserId, admin: &AdminId) -> Vec<Message> {
    let mut selected: Vec<Message> = messages
        .iter()
        .filter(|message| message.is_between(user, admin))
        .cloned()
        .collect();
    selected.sort_by_key(|message| message.created_at);
    selected
}

/// Message as the backend sends it.
///
/// Ids may come as `_id`, `id`, or both. Participants come either populated
/// (`sender: {..}`) or flat (`senderId: ".."`).
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(rename = "_id")]
    underscore_id: Option<MessageId>,
    id: Option<MessageId>,
    sender: Option<ParticipantRef>,
    sender_id: Option<ParticipantRef>,
    sender_type: SenderType,
    receiver: Option<ParticipantRef>,
    receiver_id: Option<ParticipantRef>,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<WireMessage> for Message {
    type Error = IdError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            id: document_id(wire.underscore_id, wire.id)?,
            sender_id: participant(wire.sender, wire.sender_id, "sender")?,
            sender_type: wire.sender_type,
            receiver_id: participant(wire.receiver, wire.receiver_id, "receiver")?,
            content: wire.content,
            created_at: wire.created_at,
        })
    }
}

/// Participant reference: a bare id or a populated account object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ParticipantRef {
    Id(ParticipantId),
    Populated {
        #[serde(rename = "_id")]
        underscore_id: Option<ParticipantId>,
        id: Option<ParticipantId>,
    },
}

impl ParticipantRef {
    fn into_id(self) -> Result<ParticipantId, IdError> {
        match self {
            Self::Id(id) => Ok(id),
            Self::Populated { underscore_id, id } => document_id(underscore_id, id),
        }
    }
}

fn participant(
    populated: Option<ParticipantRef>,
    flat: Option<ParticipantRef>,
    field: &'static str,
) -> Result<ParticipantId, IdError> {
    populated
        .or(flat)
        .ok_or(IdError::Missing(field))?
        .into_id()
}
