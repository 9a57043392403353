use std::fmt;

/// Transport-specific conversation identifier.
///
/// WhatsApp uses JID strings (`xx@s.whatsapp.net` for users, `xx@g.us` for groups); Telegram
/// uses signed integers rendered as strings (negative for groups).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized inbound chat message. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: ConversationId,
    pub recipient: ConversationId,
    pub is_group: bool,
    pub text: String,
}
