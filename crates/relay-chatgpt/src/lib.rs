//! ChatGPT adapter: conversation backend client plus the browser used for interactive login.
//!
//! The backend is the web conversation endpoint, so it takes the session bearer token (JWT) of a
//! logged-in web user rather than an API key.

pub mod browser;
pub mod client;
pub mod stream;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use relay_core::{
    auth::{token::mask, BrowserDriver, BrowserLaunchOptions, InteractiveTokenAcquirer, TokenCache},
    config::Config,
    source::{resolve_token, MessageSource},
    Result,
};

pub use browser::ChromeDriver;
pub use client::{ChatGptClient, ChatGptSettings};

/// Message source backed by ChatGPT.
pub struct ChatGptMessageSource {
    client: ChatGptClient,
}

impl ChatGptMessageSource {
    /// Resolve a token (environment, cache, then interactive login) and build the client.
    pub async fn connect(cfg: &Config, driver: Arc<dyn BrowserDriver>) -> Result<Self> {
        let acquirer = InteractiveTokenAcquirer::new(
            TokenCache::new(cfg.token_cache_path.clone()),
            driver,
            BrowserLaunchOptions {
                user_agent: cfg.user_agent.clone(),
                profile_dir: cfg.browser_profile_dir.clone(),
                headless: cfg.browser_headless,
            },
            cfg.login_url.clone(),
            cfg.login_timeout,
        );

        let token = resolve_token(cfg.chatgpt_jwt_token.as_deref(), &acquirer).await?;
        info!(
            "ChatGPT token ready: {} (exp={:?})",
            mask(token.as_str()),
            token.expires_at()
        );

        let client = ChatGptClient::new(token, ChatGptSettings::from_config(cfg))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MessageSource for ChatGptMessageSource {
    async fn get_response(&self, message: &str) -> Result<String> {
        let reply = self.client.talk(message).await?;
        Ok(reply.text())
    }
}
