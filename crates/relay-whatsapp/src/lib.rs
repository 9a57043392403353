//! WhatsApp adapter using the whatsapp-rust crate (multi-device protocol).
//!
//! The device identity lives in a local SQLite store. An unlinked device prints a QR code to the
//! terminal and blocks until the phone has scanned it.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{error, info, warn};
use wacore::types::events::Event;
use wacore_binary::jid::Jid;
use waproto::whatsapp as wa;
use whatsapp_rust::{bot::Bot, Client};

use relay_core::{
    domain::{ConversationId, InboundMessage},
    errors::Error,
    messaging::{
        port::{InboundSink, MessagingPort},
        recipient::parse_whatsapp_recipient,
        MessengerKind,
    },
    Result,
};

pub const DEVICE_NOT_LINKED_MESSAGE: &str =
    "Device is not linked yet. Please go to WhatsApp -> Settings -> Linked Devices and scan the QR code";

#[derive(Clone, Debug, PartialEq, Eq)]
enum LinkState {
    Starting,
    AwaitingScan,
    Connected,
    Failed(String),
}

pub struct WhatsAppMessenger {
    client: Arc<Client>,
    run_task: Mutex<Option<JoinHandle<()>>>,
}

impl WhatsAppMessenger {
    /// Open (or create) the device store, link the device if needed and connect.
    pub async fn connect(device_store: &Path, inbound: InboundSink) -> Result<Self> {
        if let Some(parent) = device_store.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store_path = device_store.to_str().ok_or_else(|| {
            Error::Config(format!(
                "whatsapp device store path is not valid utf-8: {}",
                device_store.display()
            ))
        })?;
        let backend = Arc::new(
            whatsapp_rust::store::SqliteStore::new(store_path)
                .await
                .map_err(|e| Error::External(format!("creating device store: {e}")))?,
        );

        let (link_tx, mut link_rx) = watch::channel(LinkState::Starting);

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(whatsapp_rust::transport::TokioWebSocketTransportFactory::new())
            .with_http_client(whatsapp_rust::transport::UreqHttpClient::new())
            .on_event(move |event, _client| {
                let inbound = inbound.clone();
                let link_tx = link_tx.clone();
                async move { handle_event(event, &inbound, &link_tx).await }
            })
            .build()
            .await
            .map_err(|e| Error::External(format!("initializing client: {e}")))?;

        let client = bot.client();

        let run_task = tokio::spawn(async move {
            match bot.run().await {
                Ok(handle) => {
                    if let Err(e) = handle.await {
                        error!("whatsapp client task failed: {e}");
                    }
                }
                Err(e) => error!("whatsapp client run failed: {e}"),
            }
        });

        // Blocks for as long as it takes to scan the code.
        loop {
            let state = link_rx.borrow().clone();
            match state {
                LinkState::Connected => break,
                LinkState::Failed(reason) => {
                    run_task.abort();
                    return Err(Error::External(format!("linking device: {reason}")));
                }
                LinkState::Starting | LinkState::AwaitingScan => {
                    if link_rx.changed().await.is_err() {
                        run_task.abort();
                        return Err(Error::External(
                            "connecting client: event stream ended".to_string(),
                        ));
                    }
                }
            }
        }

        Ok(Self {
            client,
            run_task: Mutex::new(Some(run_task)),
        })
    }
}

async fn handle_event(event: Event, inbound: &InboundSink, link_tx: &watch::Sender<LinkState>) {
    match event {
        Event::PairingQrCode { code, .. } => {
            let _ = link_tx.send(LinkState::AwaitingScan);
            println!("{DEVICE_NOT_LINKED_MESSAGE}");
            if let Err(e) = qr2term::print_qr(&code) {
                error!("whatsapp qr render failed: {e}");
                println!("QR data (scan manually): {code}");
            }
        }
        Event::PairSuccess(ref pair) => {
            info!("whatsapp device linked as {} ({})", pair.id, pair.platform);
        }
        Event::PairError(ref pair) => {
            let _ = link_tx.send(LinkState::Failed(pair.error.clone()));
        }
        Event::Connected(_) => {
            info!("whatsapp connected");
            let _ = link_tx.send(LinkState::Connected);
        }
        Event::LoggedOut(_) => {
            warn!("whatsapp logged out, the device has to be linked again");
        }
        Event::Message(msg, info) => {
            let Some(text) = extract_text(&msg) else {
                return;
            };
            let incoming = InboundMessage {
                sender: ConversationId::new(info.source.sender.to_string()),
                recipient: ConversationId::new(info.source.chat.to_string()),
                is_group: info.source.is_group,
                text,
            };
            if inbound.send(incoming).await.is_err() {
                warn!("inbound queue closed, dropping whatsapp message");
            }
        }
        _ => {}
    }
}

/// Plain text body of a message, if it has one.
fn extract_text(msg: &wa::Message) -> Option<String> {
    let text = msg.conversation.clone().or_else(|| {
        msg.extended_text_message
            .as_ref()
            .and_then(|ext| ext.text.clone())
    })?;
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn to_jid(recipient: &str) -> Result<Jid> {
    let address = parse_whatsapp_recipient(recipient)?;
    address
        .to_string()
        .parse::<Jid>()
        .map_err(|e| Error::invalid_recipient(recipient, format!("parsing JID: {e}")))
}

#[async_trait]
impl MessagingPort for WhatsAppMessenger {
    fn kind(&self) -> MessengerKind {
        MessengerKind::WhatsApp
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<()> {
        let jid = to_jid(recipient)?;
        let message = wa::Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        };
        self.client
            .send_message(jid, message)
            .await
            .map_err(|e| Error::External(format!("whatsapp send failed: {e}")))?;
        Ok(())
    }

    async fn disconnect(&self) {
        self.client.disconnect().await;
        if let Some(task) = self.run_task.lock().await.take() {
            task.abort();
        }
        info!("whatsapp disconnected");
    }
}
