//! Port for the conversational backend.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    auth::{InteractiveTokenAcquirer, Token},
    Result,
};

/// Something that answers a chat message.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Send `message` to the backend and return its reply text. Backend errors propagate as-is;
    /// there is no retry.
    async fn get_response(&self, message: &str) -> Result<String>;
}

/// Resolve the backend token once, at construction time.
///
/// Order: a well-formed token from the environment is used as-is, otherwise the acquirer runs
/// (which consults the on-disk cache before opening a browser). The result is fixed for the
/// lifetime of the source; nothing refreshes it when it expires.
pub async fn resolve_token(
    env_token: Option<&str>,
    acquirer: &InteractiveTokenAcquirer,
) -> Result<Token> {
    if let Some(raw) = env_token.map(str::trim).filter(|s| !s.is_empty()) {
        match Token::parse(raw) {
            Ok(token) => return Ok(token),
            Err(e) => warn!("ignoring CHATGPT_JWT_TOKEN: {e}"),
        }
    }

    info!("CHATGPT_JWT_TOKEN is not set, getting a token through an interactive browser session");
    acquirer.acquire().await
}
