use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::{
    domain::{ConversationId, InboundMessage},
    messaging::port::MessagingPort,
    source::MessageSource,
};

/// Wires inbound messages to the message source and sends replies back out.
///
/// Only one conversation (the target) is served. Every event is judged on its own; nothing is
/// carried between events.
pub struct Router {
    target: ConversationId,
    source: Arc<dyn MessageSource>,
    messenger: Arc<dyn MessagingPort>,
}

impl Router {
    pub fn new(
        target: ConversationId,
        source: Arc<dyn MessageSource>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            target,
            source,
            messenger,
        }
    }

    /// Where the reply to `msg` goes, if anywhere.
    ///
    /// Group messages are answered when the group is the target; direct messages when the sender
    /// is the target.
    pub fn route<'a>(&self, msg: &'a InboundMessage) -> Option<&'a ConversationId> {
        if msg.is_group && msg.recipient == self.target {
            Some(&msg.recipient)
        } else if !msg.is_group && msg.sender == self.target {
            Some(&msg.sender)
        } else {
            None
        }
    }

    /// Handle one inbound message. Failures are logged and the message is dropped.
    pub async fn handle(&self, msg: InboundMessage) {
        info!(
            sender = %msg.sender,
            recipient = %msg.recipient,
            is_group = msg.is_group,
            "incoming message: {}",
            msg.text
        );

        let Some(reply_to) = self.route(&msg) else {
            return;
        };

        let response = match self.source.get_response(&msg.text).await {
            Ok(response) => response,
            Err(e) => {
                error!("error calling message source: {e}");
                return;
            }
        };

        info!(recipient = %reply_to, "responding: {response}");
        if let Err(e) = self
            .messenger
            .send_message(reply_to.as_str(), &response)
            .await
        {
            error!("error sending message to {reply_to}: {e}");
        }
    }

    /// Serve messages until every sender of the inbound queue is gone.
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        while let Some(msg) = inbound.recv().await {
            self.handle(msg).await;
        }
        info!("inbound queue closed, router stopped");
    }
}
