//! Chromium driver for interactive login (chromiumoxide / CDP).

use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig, HeadlessMode},
    cdp::browser_protocol::network::{EnableParams, EventRequestWillBeSentExtraInfo},
    listeners::EventStream,
    Page,
};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use relay_core::{
    auth::{BrowserDriver, BrowserLaunchOptions, BrowserSession},
    errors::Error,
    Result,
};

/// Launches a local Chromium and watches the raw headers of every outgoing request.
#[derive(Clone, Debug, Default)]
pub struct ChromeDriver;

impl ChromeDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn launch(&self, opts: &BrowserLaunchOptions) -> Result<Box<dyn BrowserSession>> {
        let headless = if opts.headless {
            HeadlessMode::New
        } else {
            HeadlessMode::False
        };

        let config = BrowserConfig::builder()
            .user_data_dir(&opts.profile_dir)
            .headless_mode(headless)
            .arg(format!("--user-agent={}", opts.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--password-store=basic")
            .window_size(1280, 800)
            .build()
            .map_err(|e| Error::External(format!("browser config error: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_err("launch", e))?;

        // The CDP handler must be polled for the browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler stopped: {e}");
                    break;
                }
            }
        });

        match open_observed_page(&browser).await {
            Ok((page, requests)) => Ok(Box::new(ChromeSession {
                browser,
                handler_task,
                page,
                requests,
            })),
            Err(e) => {
                shutdown(&mut browser, handler_task).await;
                Err(e)
            }
        }
    }
}

async fn open_observed_page(
    browser: &Browser,
) -> Result<(Page, EventStream<EventRequestWillBeSentExtraInfo>)> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| browser_err("new page", e))?;
    page.execute(EnableParams::default())
        .await
        .map_err(|e| browser_err("network enable", e))?;
    let requests = page
        .event_listener::<EventRequestWillBeSentExtraInfo>()
        .await
        .map_err(|e| browser_err("request listener", e))?;
    Ok((page, requests))
}

struct ChromeSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
    requests: EventStream<EventRequestWillBeSentExtraInfo>,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| browser_err("navigate", e))?;
        Ok(())
    }

    async fn next_authorization_header(&mut self) -> Option<String> {
        while let Some(event) = self.requests.next().await {
            if let Some(value) = authorization_header(event.headers.inner()) {
                return Some(value);
            }
        }
        None
    }

    async fn close(self: Box<Self>) {
        let ChromeSession {
            mut browser,
            handler_task,
            page,
            requests,
        } = *self;
        drop(requests);
        drop(page);
        shutdown(&mut browser, handler_task).await;
    }
}

async fn shutdown(browser: &mut Browser, handler_task: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        warn!("failed to close browser: {e}");
    }
    if let Err(e) = browser.wait().await {
        warn!("failed to reap browser process: {e}");
    }
    handler_task.abort();
}

/// Header names are case-insensitive; HTTP/2 requests report them lowercased.
fn authorization_header(headers: &serde_json::Value) -> Option<String> {
    headers
        .as_object()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        .and_then(|(_, value)| value.as_str())
        .map(str::to_string)
}

fn browser_err(stage: &str, e: impl std::fmt::Display) -> Error {
    Error::External(format!("browser {stage} failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_authorization_header_in_any_case() {
        let headers = json!({ ":authority": "chat.openai.com", "Authorization": "Bearer abc" });
        assert_eq!(
            authorization_header(&headers).as_deref(),
            Some("Bearer abc")
        );

        let lower = json!({ "authorization": "Bearer xyz" });
        assert_eq!(authorization_header(&lower).as_deref(), Some("Bearer xyz"));
    }

    #[test]
    fn missing_or_odd_headers_yield_nothing() {
        assert_eq!(authorization_header(&json!({ "accept": "*/*" })), None);
        assert_eq!(authorization_header(&json!({ "authorization": 42 })), None);
        assert_eq!(authorization_header(&json!(null)), None);
    }
}
