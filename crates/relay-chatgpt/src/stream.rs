//! Reading the conversation endpoint's `text/event-stream` reply.

use std::fmt::Display;

use eventsource_stream::{Event, EventStreamError};
use futures::{Stream, StreamExt};
use relay_core::{errors::Error, Result};
use tracing::debug;

/// Data payload that terminates the stream.
const DONE_MARKER: &str = "[DONE]";

/// The final state of a streamed assistant message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reply {
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
    pub parts: Vec<String>,
}

impl Reply {
    /// All text fragments joined by a single space.
    pub fn text(&self) -> String {
        self.parts.join(" ")
    }
}

/// Consume server-sent events until `[DONE]` or the end of the stream.
///
/// Each event repeats the whole message so far, so the last event that carries content wins.
pub async fn read_reply<S, E>(mut events: S) -> Result<Reply>
where
    S: Stream<Item = std::result::Result<Event, EventStreamError<E>>> + Unpin,
    E: Display,
{
    let mut reply: Option<Reply> = None;

    while let Some(event) = events.next().await {
        let event =
            event.map_err(|e| Error::External(format!("chatgpt stream error: {e}")))?;
        let data = event.data.trim();
        if data == DONE_MARKER {
            break;
        }
        if data.is_empty() {
            continue;
        }

        let value: serde_json::Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                debug!("skipping unparseable stream event: {e}");
                continue;
            }
        };

        if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
            let msg = err
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(Error::External(format!("chatgpt error: {msg}")));
        }

        if let Some(parsed) = reply_from_event(&value) {
            reply = Some(parsed);
        }
    }

    reply.ok_or_else(|| Error::External("chatgpt returned no message".to_string()))
}

fn reply_from_event(value: &serde_json::Value) -> Option<Reply> {
    let message = value.get("message")?;
    let parts = message
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .filter_map(|p| p.as_str().map(str::to_string))
        .collect::<Vec<_>>();

    Some(Reply {
        conversation_id: value
            .get("conversation_id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        message_id: message
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        parts,
    })
}
