use std::sync::Arc;

use tracing::{error, info, warn};

use relay_chatgpt::{ChatGptMessageSource, ChromeDriver};
use relay_core::{
    config::Config,
    messaging::{
        port::{inbound_channel, InboundSink, MessagingPort},
        MessengerKind,
    },
    router::Router,
    Error,
};
use relay_telegram::TelegramMessenger;

const DEFAULT_MESSENGER: MessengerKind = if cfg!(feature = "whatsapp") {
    MessengerKind::WhatsApp
} else {
    MessengerKind::Telegram
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let dotenv = dotenvy::dotenv();
    relay_core::logging::init("chatgpt-relay")?;
    if let Err(e) = dotenv {
        warn!("error loading environment from .env file: {e}");
    }

    if let Err(e) = run().await {
        error!("{e}");
        return Err(e);
    }
    Ok(())
}

async fn run() -> Result<(), Error> {
    let cfg = Config::load(DEFAULT_MESSENGER)?;

    info!("connecting messenger ({})...", cfg.messenger);
    let (inbound_tx, inbound_rx) = inbound_channel();
    let messenger = create_messenger(&cfg, inbound_tx).await?;
    info!("{} messenger connected", messenger.kind());

    info!("connecting message source...");
    let driver = Arc::new(ChromeDriver::new());
    let source = Arc::new(
        ChatGptMessageSource::connect(&cfg, driver)
            .await
            .map_err(|e| Error::External(format!("initializing ChatGPT client: {e}")))?,
    );

    let router = Router::new(cfg.target_id.clone(), source, messenger.clone());
    let router_task = tokio::spawn(router.run(inbound_rx));

    info!(
        "Everything is set up. Listening for messages and responding to ID {}... (Press Ctrl+C to quit)",
        cfg.target_id
    );

    shutdown_signal().await;
    info!("shutting down");

    // Dropping the queue's receiver unblocks adapters waiting on a full queue.
    router_task.abort();
    messenger.disconnect().await;
    Ok(())
}

async fn create_messenger(
    cfg: &Config,
    inbound: InboundSink,
) -> Result<Arc<dyn MessagingPort>, Error> {
    let kind = cfg.messenger;
    let messenger: Arc<dyn MessagingPort> = match kind {
        MessengerKind::Telegram => Arc::new(
            TelegramMessenger::connect(cfg.telegram_bot_token.as_deref(), inbound)
                .await
                .map_err(|e| creating(kind, e))?,
        ),
        MessengerKind::WhatsApp => connect_whatsapp(cfg, inbound)
            .await
            .map_err(|e| creating(kind, e))?,
    };
    Ok(messenger)
}

#[cfg(feature = "whatsapp")]
async fn connect_whatsapp(
    cfg: &Config,
    inbound: InboundSink,
) -> Result<Arc<dyn MessagingPort>, Error> {
    let messenger =
        relay_whatsapp::WhatsAppMessenger::connect(&cfg.whatsapp_device_store, inbound).await?;
    Ok(Arc::new(messenger))
}

#[cfg(not(feature = "whatsapp"))]
async fn connect_whatsapp(
    _cfg: &Config,
    _inbound: InboundSink,
) -> Result<Arc<dyn MessagingPort>, Error> {
    Err(Error::Config(
        "built without WhatsApp support (rebuild with --features whatsapp)".to_string(),
    ))
}

/// Add the transport name to a construction error, keeping config errors distinguishable.
fn creating(kind: MessengerKind, e: Error) -> Error {
    match e {
        Error::Config(msg) => Error::Config(format!("creating {kind} client: {msg}")),
        other => Error::External(format!("creating {kind} client: {other}")),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_errors_name_the_transport() {
        let e = creating(MessengerKind::Telegram, Error::Config("no token".to_string()));
        assert!(matches!(&e, Error::Config(m) if m == "creating Telegram client: no token"));

        let e = creating(
            MessengerKind::WhatsApp,
            Error::External("store locked".to_string()),
        );
        assert!(e.to_string().contains("creating WhatsApp client"));
    }

    #[cfg(not(feature = "whatsapp"))]
    #[tokio::test]
    async fn whatsapp_requires_the_feature() {
        let cfg = Config::load(MessengerKind::WhatsApp).unwrap();
        let (tx, _rx) = inbound_channel();
        assert!(matches!(
            connect_whatsapp(&cfg, tx).await,
            Err(Error::Config(_))
        ));
    }
}
