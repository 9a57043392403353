use std::time::Duration;

use eventsource_stream::Eventsource;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use relay_core::{auth::Token, config::Config, errors::Error, Result};

use crate::stream::{read_reply, Reply};

#[derive(Clone, Debug)]
pub struct ChatGptSettings {
    pub backend_url: String,
    pub model: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl ChatGptSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            backend_url: cfg.backend_url.clone(),
            model: cfg.model.clone(),
            user_agent: cfg.user_agent.clone(),
            request_timeout: cfg.request_timeout,
        }
    }
}

/// Where the next message attaches in the conversation tree.
#[derive(Debug)]
struct ConversationState {
    conversation_id: Option<String>,
    parent_message_id: String,
}

/// Client for the ChatGPT web conversation endpoint.
///
/// Consecutive messages continue one conversation. The token is fixed at construction.
#[derive(Debug)]
pub struct ChatGptClient {
    http: reqwest::Client,
    token: Token,
    settings: ChatGptSettings,
    conversation: Mutex<ConversationState>,
}

impl ChatGptClient {
    pub fn new(token: Token, settings: ChatGptSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| Error::External(format!("chatgpt http client build failed: {e}")))?;

        Ok(Self {
            http,
            token,
            settings,
            conversation: Mutex::new(ConversationState {
                conversation_id: None,
                parent_message_id: Uuid::new_v4().to_string(),
            }),
        })
    }

    /// Send one user message and wait for the complete reply.
    pub async fn talk(&self, message: &str) -> Result<Reply> {
        // Held for the whole exchange so replies thread in order.
        let mut conversation = self.conversation.lock().await;

        let body = conversation_request(
            message,
            &self.settings.model,
            &conversation.parent_message_id,
            conversation.conversation_id.as_deref(),
        );

        let resp = self
            .http
            .post(&self.settings.backend_url)
            .bearer_auth(self.token.as_str())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("chatgpt request error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "chatgpt request failed: {status} {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let events = resp.bytes_stream().eventsource();
        futures::pin_mut!(events);
        let reply = read_reply(events).await?;
        debug!(
            conversation_id = ?reply.conversation_id,
            message_id = ?reply.message_id,
            parts = reply.parts.len(),
            "chatgpt reply"
        );

        if let Some(id) = &reply.conversation_id {
            conversation.conversation_id = Some(id.clone());
        }
        if let Some(id) = &reply.message_id {
            conversation.parent_message_id = id.clone();
        }

        Ok(reply)
    }
}

fn conversation_request(
    message: &str,
    model: &str,
    parent_message_id: &str,
    conversation_id: Option<&str>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "action": "next",
        "messages": [{
            "id": Uuid::new_v4().to_string(),
            "author": { "role": "user" },
            "role": "user",
            "content": { "content_type": "text", "parts": [message] },
        }],
        "parent_message_id": parent_message_id,
        "model": model,
    });
    if let Some(id) = conversation_id {
        body["conversation_id"] = serde_json::Value::String(id.to_string());
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_starts_a_new_conversation() {
        let body = conversation_request("hi", "model-x", "parent-1", None);
        assert_eq!(body["action"], "next");
        assert_eq!(body["model"], "model-x");
        assert_eq!(body["parent_message_id"], "parent-1");
        assert_eq!(body["messages"][0]["content"]["parts"][0], "hi");
        assert_eq!(body["messages"][0]["author"]["role"], "user");
        assert!(body.get("conversation_id").is_none());
    }

    #[test]
    fn follow_up_request_continues_the_conversation() {
        let body = conversation_request("again", "model-x", "m-7", Some("c-1"));
        assert_eq!(body["conversation_id"], "c-1");
        assert_eq!(body["parent_message_id"], "m-7");
    }
}
