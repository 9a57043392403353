//! Cross-messenger abstractions (WhatsApp and Telegram).

pub mod port;
pub mod recipient;

use std::{fmt, str::FromStr};

use crate::{errors::Error, Result};

/// The transports the relay can run on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessengerKind {
    WhatsApp,
    Telegram,
}

impl MessengerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessengerKind::WhatsApp => "whatsapp",
            MessengerKind::Telegram => "telegram",
        }
    }
}

impl fmt::Display for MessengerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessengerKind::WhatsApp => "WhatsApp",
            MessengerKind::Telegram => "Telegram",
        };
        f.write_str(name)
    }
}

impl FromStr for MessengerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whatsapp" | "wa" => Ok(MessengerKind::WhatsApp),
            "telegram" | "tg" => Ok(MessengerKind::Telegram),
            other => Err(Error::Config(format!(
                "unsupported messenger client type: {other:?} (expected whatsapp or telegram)"
            ))),
        }
    }
}
