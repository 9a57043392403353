use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{domain::InboundMessage, messaging::MessengerKind, Result};

/// Capacity of the inbound queue between an adapter and the router.
pub const INBOUND_QUEUE_CAPACITY: usize = 64;

/// The single inbound handler of a messenger.
///
/// Adapters receive it at construction and push every normalized message into it; the router
/// owns the receiving end. There is exactly one per process and it cannot be replaced.
pub type InboundSink = mpsc::Sender<InboundMessage>;

/// Create the inbound queue shared by one adapter and the router.
pub fn inbound_channel() -> (InboundSink, mpsc::Receiver<InboundMessage>) {
    mpsc::channel(INBOUND_QUEUE_CAPACITY)
}

/// Cross-messenger port (outbound side).
///
/// WhatsApp and Telegram both fit behind it; recipients are transport-specific strings
/// (see [`crate::messaging::recipient`]).
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn kind(&self) -> MessengerKind;

    async fn send_message(&self, recipient: &str, text: &str) -> Result<()>;

    /// Tear down the transport connection. Connectionless transports treat this as a no-op.
    async fn disconnect(&self);
}
