use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    auth::{cache::TokenCache, token::Token},
    errors::Error,
    Result,
};

/// How the browser used for interactive login is launched.
#[derive(Clone, Debug)]
pub struct BrowserLaunchOptions {
    pub user_agent: String,
    /// Persistent profile so a completed login survives restarts.
    pub profile_dir: PathBuf,
    pub headless: bool,
}

/// Browser automation capability: launch a browser that reports outgoing request headers.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Allocate a browser with request observation already enabled.
    async fn launch(&self, opts: &BrowserLaunchOptions) -> Result<Box<dyn BrowserSession>>;
}

/// A running browser. Must be closed by the caller on every path.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Next observed `Authorization` header value of an outgoing request.
    ///
    /// `None` once the browser stops reporting requests.
    async fn next_authorization_header(&mut self) -> Option<String>;

    /// Release the browser and everything allocated for it.
    async fn close(self: Box<Self>);
}

/// Progress of a single acquisition, reported through tracing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireState {
    Idle,
    Launching,
    AwaitingToken,
    Captured,
    TimedOut,
}

/// Obtains a backend token from the cache or by sniffing a real browser login.
pub struct InteractiveTokenAcquirer {
    cache: TokenCache,
    driver: Arc<dyn BrowserDriver>,
    launch: BrowserLaunchOptions,
    login_url: String,
    timeout: Duration,
}

impl InteractiveTokenAcquirer {
    pub fn new(
        cache: TokenCache,
        driver: Arc<dyn BrowserDriver>,
        launch: BrowserLaunchOptions,
        login_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            driver,
            launch,
            login_url: login_url.into(),
            timeout,
        }
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Return a live cached token, or open the login page and wait for the first bearer token
    /// the page sends.
    ///
    /// Fails with [`Error::InteractiveTimeout`] when no token shows up within the timeout.
    pub async fn acquire(&self) -> Result<Token> {
        let mut state = AcquireState::Idle;
        debug!(?state, "token acquisition started");

        if let Some(token) = self.cache.read() {
            info!(
                "using cached token from {} (exp={:?})",
                self.cache.path().display(),
                token.expires_at()
            );
            return Ok(token);
        }

        state = AcquireState::Launching;
        info!(?state, url = %self.login_url, "no cached token, opening browser for login");
        let mut session = self.driver.launch(&self.launch).await?;

        let outcome = self.capture(session.as_mut()).await;
        session.close().await;

        state = match &outcome {
            Ok(_) => AcquireState::Captured,
            Err(Error::InteractiveTimeout) => AcquireState::TimedOut,
            Err(_) => state,
        };
        debug!(?state, "token acquisition finished");

        let token = outcome?;
        if let Err(e) = self.cache.write(&token) {
            warn!(
                "failed to cache token at {}: {e}",
                self.cache.path().display()
            );
        }
        Ok(token)
    }

    async fn capture(&self, session: &mut dyn BrowserSession) -> Result<Token> {
        session.navigate(&self.login_url).await?;
        debug!(state = ?AcquireState::AwaitingToken, timeout = ?self.timeout, "waiting for bearer token");

        let first_token = async {
            loop {
                match session.next_authorization_header().await {
                    Some(header) => {
                        if let Some(token) = Token::from_authorization_header(&header) {
                            return token;
                        }
                    }
                    // Nothing more will arrive; let the timer decide.
                    None => std::future::pending::<()>().await,
                }
            }
        };

        tokio::time::timeout(self.timeout, first_token)
            .await
            .map_err(|_| Error::InteractiveTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::fake_jwt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        navigations: AtomicUsize,
        closes: AtomicUsize,
    }

    struct FakeDriver {
        counters: Arc<Counters>,
        headers: Mutex<Vec<String>>,
        fail_navigation: bool,
    }

    impl FakeDriver {
        fn new(headers: Vec<String>) -> Self {
            Self {
                counters: Arc::new(Counters::default()),
                headers: Mutex::new(headers),
                fail_navigation: false,
            }
        }
    }

    struct FakeSession {
        counters: Arc<Counters>,
        headers: VecDeque<String>,
        fail_navigation: bool,
    }

    #[async_trait]
    impl BrowserDriver for FakeDriver {
        async fn launch(&self, _opts: &BrowserLaunchOptions) -> Result<Box<dyn BrowserSession>> {
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                counters: self.counters.clone(),
                headers: self.headers.lock().unwrap().drain(..).collect(),
                fail_navigation: self.fail_navigation,
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(&mut self, _url: &str) -> Result<()> {
            self.counters.navigations.fetch_add(1, Ordering::SeqCst);
            if self.fail_navigation {
                return Err(Error::External("navigation failed".to_string()));
            }
            Ok(())
        }

        async fn next_authorization_header(&mut self) -> Option<String> {
            self.headers.pop_front()
        }

        async fn close(self: Box<Self>) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn scratch_cache(name: &str) -> TokenCache {
        let dir =
            std::env::temp_dir().join(format!("relay-acquirer-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        TokenCache::new(dir.join("token.jwt"))
    }

    fn acquirer(cache: TokenCache, driver: Arc<FakeDriver>, timeout: Duration) -> InteractiveTokenAcquirer {
        InteractiveTokenAcquirer::new(
            cache,
            driver,
            BrowserLaunchOptions {
                user_agent: "test-agent".to_string(),
                profile_dir: std::env::temp_dir().join("relay-test-profile"),
                headless: true,
            },
            "https://login.invalid/",
            timeout,
        )
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[tokio::test]
    async fn cached_token_skips_the_browser() {
        let cache = scratch_cache("cached");
        let cached = Token::parse(&fake_jwt(Some(far_future()))).unwrap();
        cache.write(&cached).unwrap();

        let driver = Arc::new(FakeDriver::new(Vec::new()));
        let got = acquirer(cache, driver.clone(), Duration::from_secs(5))
            .acquire()
            .await
            .unwrap();

        assert_eq!(got, cached);
        assert_eq!(driver.counters.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_valid_bearer_token_wins_and_is_cached() {
        let cache = scratch_cache("capture");
        let first = fake_jwt(Some(far_future()));
        let second = fake_jwt(Some(far_future() + 60));
        let driver = Arc::new(FakeDriver::new(vec![
            "Basic dXNlcjpwYXNz".to_string(),
            "Bearer not-a-jwt".to_string(),
            format!("Bearer {first}"),
            format!("Bearer {second}"),
        ]));

        let acq = acquirer(cache.clone(), driver.clone(), Duration::from_secs(5));
        let got = acq.acquire().await.unwrap();

        assert_eq!(got.as_str(), first);
        assert_eq!(cache.read().map(|t| t.as_str().to_string()), Some(first));
        assert_eq!(driver.counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(driver.counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn times_out_without_token_and_releases_browser() {
        let cache = scratch_cache("timeout");
        let driver = Arc::new(FakeDriver::new(vec!["Bearer garbage".to_string()]));

        let err = acquirer(cache.clone(), driver.clone(), Duration::from_millis(50))
            .acquire()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InteractiveTimeout));
        assert!(err.to_string().contains("did you login"));
        assert_eq!(driver.counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(cache.read(), None);
    }

    #[tokio::test]
    async fn navigation_error_still_releases_browser() {
        let cache = scratch_cache("navfail");
        let mut driver = FakeDriver::new(Vec::new());
        driver.fail_navigation = true;
        let driver = Arc::new(driver);

        let err = acquirer(cache, driver.clone(), Duration::from_secs(5))
            .acquire()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::External(_)));
        assert_eq!(driver.counters.navigations.load(Ordering::SeqCst), 1);
        assert_eq!(driver.counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_cache_entry_triggers_login() {
        let cache = scratch_cache("expired");
        cache
            .write(&Token::parse(&fake_jwt(Some(1))).unwrap())
            .unwrap();
        let fresh = fake_jwt(Some(far_future()));
        let driver = Arc::new(FakeDriver::new(vec![format!("Bearer {fresh}")]));

        let got = acquirer(cache, driver.clone(), Duration::from_secs(5))
            .acquire()
            .await
            .unwrap();

        assert_eq!(got.as_str(), fresh);
        assert_eq!(driver.counters.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_write_failure_still_returns_token() {
        let dir = std::env::temp_dir().join(format!(
            "relay-acquirer-{}-unwritable",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let cache = TokenCache::new(blocker.join("token.jwt"));

        let fresh = fake_jwt(Some(far_future()));
        let driver = Arc::new(FakeDriver::new(vec![format!("Bearer {fresh}")]));
        let got = acquirer(cache.clone(), driver.clone(), Duration::from_secs(5))
            .acquire()
            .await
            .unwrap();

        assert_eq!(got.as_str(), fresh);
        assert_eq!(driver.counters.closes.load(Ordering::SeqCst), 1);
        assert!(matches!(cache.write(&got), Err(Error::Io(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
