//! Recipient parsing for the two transports.

use crate::{errors::Error, Result};

/// Server suffix for individual WhatsApp users.
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";

/// Server suffix for WhatsApp groups.
pub const GROUP_SERVER: &str = "g.us";

/// A parsed WhatsApp address (`user@server`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WhatsAppAddress {
    pub user: String,
    pub server: String,
}

impl std::fmt::Display for WhatsAppAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

/// Parse a WhatsApp recipient.
///
/// Accepts `user@server` addresses or a bare user (phone number), which gets the default user
/// server. A single leading `+` is stripped first.
pub fn parse_whatsapp_recipient(recipient: &str) -> Result<WhatsAppAddress> {
    let trimmed = recipient.trim();
    let raw = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if raw.is_empty() {
        return Err(Error::invalid_recipient(recipient, "empty address"));
    }

    let Some((user, server)) = raw.split_once('@') else {
        return Ok(WhatsAppAddress {
            user: raw.to_string(),
            server: DEFAULT_USER_SERVER.to_string(),
        });
    };

    if user.is_empty() {
        return Err(Error::invalid_recipient(recipient, "no user specified"));
    }
    if server.is_empty() || server.contains('@') {
        return Err(Error::invalid_recipient(recipient, "invalid server"));
    }

    Ok(WhatsAppAddress {
        user: user.to_string(),
        server: server.to_string(),
    })
}

/// Parse a Telegram chat id. Only signed integers are valid.
pub fn parse_telegram_chat_id(recipient: &str) -> Result<i64> {
    recipient
        .trim()
        .parse::<i64>()
        .map_err(|e| Error::invalid_recipient(recipient, format!("parsing recipient as int: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_gets_default_server() {
        let addr = parse_whatsapp_recipient("31612345678").unwrap();
        assert_eq!(addr.to_string(), "31612345678@s.whatsapp.net");
        assert_eq!(addr.server, DEFAULT_USER_SERVER);
    }

    #[test]
    fn leading_plus_is_stripped_and_address_kept() {
        let addr = parse_whatsapp_recipient("+31612345678@g.us").unwrap();
        assert_eq!(addr.user, "31612345678");
        assert_eq!(addr.server, GROUP_SERVER);

        let bare = parse_whatsapp_recipient("+31612345678").unwrap();
        assert_eq!(bare.to_string(), "31612345678@s.whatsapp.net");
    }

    #[test]
    fn rejects_malformed_whatsapp_addresses() {
        for bad in ["", "+", "@g.us", "123@", "a@b@c"] {
            assert!(
                matches!(
                    parse_whatsapp_recipient(bad),
                    Err(Error::InvalidRecipient { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn telegram_ids_are_signed_integers() {
        assert_eq!(parse_telegram_chat_id("12345").unwrap(), 12345);
        assert_eq!(parse_telegram_chat_id("-100987").unwrap(), -100987);
        assert!(matches!(
            parse_telegram_chat_id("xx@g.us"),
            Err(Error::InvalidRecipient { .. })
        ));
    }
}
