//! Telegram adapter (teloxide).
//!
//! Implements the `relay-core` MessagingPort over the Telegram Bot API. Updates are long-polled
//! by a teloxide dispatcher on a background task and pushed into the inbound queue.
//!
//! By default a bot only sees group messages that are commands or mention it; disable privacy
//! mode with BotFather's `/setprivacy` to relay every group message.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::Message,
    update_listeners::Polling,
};
use tracing::{debug, info, warn};

use relay_core::{
    domain::{ConversationId, InboundMessage},
    errors::Error,
    messaging::{
        port::{InboundSink, MessagingPort},
        recipient::parse_telegram_chat_id,
        MessengerKind,
    },
    Result,
};

/// Long-poll window for `getUpdates`.
pub const UPDATES_TIMEOUT: Duration = Duration::from_secs(60);

/// Bot API limit for one text message, in characters.
pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    shutdown: ShutdownToken,
}

impl TelegramMessenger {
    /// Authorize the bot and start consuming updates in the background.
    ///
    /// Fails when no bot token is configured or the Bot API rejects it.
    pub async fn connect(bot_token: Option<&str>, inbound: InboundSink) -> Result<Self> {
        let token = bot_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "no bot API token available (please set the TELEGRAM_BOT_API_TOKEN environment variable)"
                        .to_string(),
                )
            })?;

        // The HTTP timeout has to outlast the long-poll window.
        let http = teloxide::net::default_reqwest_settings()
            .timeout(UPDATES_TIMEOUT + Duration::from_secs(10))
            .build()
            .map_err(|e| Error::External(format!("telegram http client build failed: {e}")))?;
        let bot = Bot::with_client(token, http);

        let me = bot
            .get_me()
            .await
            .map_err(|e| Error::External(format!("creating new Telegram bot: {e}")))?;
        info!("telegram bot authorized as @{}", me.username());

        let listener = Polling::builder(bot.clone())
            .timeout(UPDATES_TIMEOUT)
            .build();

        let handler = Update::filter_message().endpoint(forward_message);
        let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
            .dependencies(dptree::deps![inbound])
            .default_handler(|upd| async move {
                debug!("ignoring telegram update {:?}", upd.id);
            })
            .build();
        let shutdown = dispatcher.shutdown_token();

        tokio::spawn(async move {
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("telegram update listener error"),
                )
                .await;
            info!("telegram dispatcher stopped");
        });

        Ok(Self { bot, shutdown })
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn kind(&self) -> MessengerKind {
        MessengerKind::Telegram
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<()> {
        let chat_id = teloxide::types::ChatId(parse_telegram_chat_id(recipient)?);
        for chunk in split_text(text, MAX_MESSAGE_LEN) {
            self.bot
                .send_message(chat_id, chunk)
                .await
                .map_err(Self::map_err)?;
        }
        Ok(())
    }

    async fn disconnect(&self) {
        match self.shutdown.shutdown() {
            Ok(stopped) => stopped.await,
            Err(e) => debug!("telegram dispatcher not running: {e}"),
        }
    }
}

async fn forward_message(msg: Message, inbound: InboundSink) -> ResponseResult<()> {
    let Some(msg) = normalize_message(&msg) else {
        return Ok(());
    };
    if inbound.send(msg).await.is_err() {
        warn!("inbound queue closed, dropping telegram message");
    }
    Ok(())
}

/// Map a Telegram message to the cross-messenger model. Messages without text are skipped.
fn normalize_message(message: &Message) -> Option<InboundMessage> {
    let from = message.from()?;
    let text = message.text()?;

    Some(InboundMessage {
        sender: ConversationId::new(from.id.0.to_string()),
        recipient: ConversationId::new(message.chat.id.0.to_string()),
        // Supergroups count as groups too, unlike a plain `type == "group"` check.
        is_group: message.chat.is_group() || message.chat.is_supergroup(),
        text: text.to_string(),
    })
}

/// Split `s` into chunks of at most `max_len` characters.
fn split_text(s: &str, max_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0;

    for ch in s.chars() {
        if cur_len >= max_len {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        cur.push(ch);
        cur_len += 1;
    }
    if !cur.is_empty() || out.is_empty() {
        out.push(cur);
    }
    out
}
