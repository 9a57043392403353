use std::{env, path::PathBuf, time::Duration};

use crate::{domain::ConversationId, errors::Error, messaging::MessengerKind, Result};

pub const DEFAULT_TARGET_ID: &str = "xx@g.us";
pub const DEFAULT_LOGIN_URL: &str = "https://chat.openai.com/auth/login";
pub const DEFAULT_BACKEND_URL: &str = "https://chat.openai.com/backend-api/conversation";
pub const DEFAULT_MODEL: &str = "text-davinci-002-render-sha";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/105.0.0.0 Safari/537.36";

/// Typed configuration, read once at startup.
///
/// `.env` is expected to be loaded into the process environment before `load` runs.
#[derive(Clone, Debug)]
pub struct Config {
    // Routing
    pub messenger: MessengerKind,
    pub target_id: ConversationId,

    // Transports
    pub telegram_bot_token: Option<String>,
    pub whatsapp_device_store: PathBuf,

    // Backend credentials
    pub chatgpt_jwt_token: Option<String>,
    pub token_cache_path: PathBuf,

    // Interactive login
    pub login_url: String,
    pub login_timeout: Duration,
    pub browser_profile_dir: PathBuf,
    pub browser_headless: bool,
    pub user_agent: String,

    // Conversation backend
    pub backend_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `default_messenger` is used when `MESSENGER` is unset; it depends on which transports the
    /// binary was built with.
    pub fn load(default_messenger: MessengerKind) -> Result<Self> {
        let messenger = match env_str("MESSENGER").and_then(non_empty) {
            Some(v) => v.parse::<MessengerKind>()?,
            None => default_messenger,
        };

        let target_id = ConversationId::new(
            env_str("TARGET_ID")
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_TARGET_ID.to_string()),
        );

        let telegram_bot_token = env_str("TELEGRAM_BOT_API_TOKEN").and_then(non_empty);
        let whatsapp_device_store =
            env_path("WHATSAPP_DEVICE_STORE").unwrap_or_else(|| PathBuf::from("db/whatsapp.db"));

        let chatgpt_jwt_token = env_str("CHATGPT_JWT_TOKEN").and_then(non_empty);
        let token_cache_path = env_path("CHATGPT_TOKEN_CACHE")
            .unwrap_or_else(|| PathBuf::from("db/chatgpt_token.jwt"));

        let login_url = env_str("CHATGPT_LOGIN_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());
        let login_timeout =
            Duration::from_secs(env_u64("CHATGPT_LOGIN_TIMEOUT_SECS").unwrap_or(30));
        if login_timeout.is_zero() {
            return Err(Error::Config(
                "CHATGPT_LOGIN_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        let browser_profile_dir = env_path("CHATGPT_BROWSER_PROFILE")
            .unwrap_or_else(|| env::temp_dir().join("_chromedp"));
        let browser_headless = env_bool("CHATGPT_BROWSER_HEADLESS").unwrap_or(false);
        let user_agent = env_str("CHATGPT_USER_AGENT")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let backend_url = env_str("CHATGPT_BACKEND_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let model = env_str("CHATGPT_MODEL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let request_timeout =
            Duration::from_secs(env_u64("CHATGPT_REQUEST_TIMEOUT_SECS").unwrap_or(120));

        Ok(Self {
            messenger,
            target_id,
            telegram_bot_token,
            whatsapp_device_store,
            chatgpt_jwt_token,
            token_cache_path,
            login_url,
            login_timeout,
            browser_profile_dir,
            browser_headless,
            user_agent,
            backend_url,
            model,
            request_timeout,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
