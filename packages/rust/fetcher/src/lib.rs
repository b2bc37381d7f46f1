//! Remote HTML fragment retrieval.
//!
//! A fetch never fails the caller: transport errors, timeouts and non-2xx
//! responses all come back as [`FetchOutcome::Failure`] so one bad fragment
//! cannot take down the pass. [`fetch_all`] fans out over every URL and joins
//! on all of them, keeping results in input order.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tracing::{debug, instrument, warn};
use url::Url;

use ssireplace_shared::{FetchOutcome, Result, SsiReplaceError};

/// Maximum number of redirects to follow for a fragment.
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for fragment requests.
const USER_AGENT: &str = concat!("SsiReplace/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// FragmentFetcher
// ---------------------------------------------------------------------------

/// Retrieves one fragment. Implementations hold no per-call state and may be
/// called concurrently.
#[async_trait]
pub trait FragmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchOutcome;
}

/// [`FragmentFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the default client settings.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| SsiReplaceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn try_fetch(&self, url: &str, timeout: Duration) -> std::result::Result<String, String> {
        let parsed = Url::parse(url).map_err(|e| format!("invalid URL: {e}"))?;

        let response = self
            .client
            .get(parsed)
            .header(ACCEPT, "text/html")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| describe(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        response
            .text()
            .await
            .map_err(|e| format!("failed to read body: {}", describe(&e, timeout)))
    }
}

#[async_trait]
impl FragmentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchOutcome {
        debug!(url, timeout_ms = timeout.as_millis() as u64, "fetching fragment");

        match self.try_fetch(url, timeout).await {
            Ok(body) => {
                debug!(url, bytes = body.len(), "fragment fetched");
                FetchOutcome::Success(body)
            }
            Err(cause) => {
                warn!(url, error = %cause, "fragment fetch failed");
                FetchOutcome::Failure(format!("Failed to fetch {url}: {cause}"))
            }
        }
    }
}

fn describe(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("timeout of {}ms exceeded", timeout.as_millis())
    } else {
        err.to_string()
    }
}

// ---------------------------------------------------------------------------
// Fan-out / fan-in
// ---------------------------------------------------------------------------

/// Fetch every URL concurrently and wait for all of them to settle.
///
/// `result[i]` is the outcome for `urls[i]`, whatever order they finish in.
pub async fn fetch_all<F, S>(fetcher: &F, urls: &[S], timeout: Duration) -> Vec<FetchOutcome>
where
    F: FragmentFetcher + ?Sized,
    S: AsRef<str>,
{
    fetch_all_with(fetcher, urls, timeout, |_, _| {}).await
}

/// Like [`fetch_all`], calling `on_settled(index, outcome)` as each fetch finishes.
#[instrument(skip_all, fields(count = urls.len(), timeout_ms = timeout.as_millis() as u64))]
pub async fn fetch_all_with<F, S, C>(
    fetcher: &F,
    urls: &[S],
    timeout: Duration,
    on_settled: C,
) -> Vec<FetchOutcome>
where
    F: FragmentFetcher + ?Sized,
    S: AsRef<str>,
    C: Fn(usize, &FetchOutcome),
{
    let on_settled = &on_settled;
    let outcomes = join_all(urls.iter().enumerate().map(|(i, url)| async move {
        let outcome = fetcher.fetch(url.as_ref(), timeout).await;
        on_settled(i, &outcome);
        outcome
    }))
    .await;

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    debug!(fetched = outcomes.len() - failed, failed, "all fragment fetches settled");

    outcomes
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Barrier;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(5000);

    #[tokio::test]
    async fn test_fetch_success_sends_accept_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/header.html"))
            .and(header("accept", "text/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<header>Hi</header>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/header.html", server.uri());
        let outcome = fetcher.fetch(&url, TIMEOUT).await;

        assert_eq!(outcome, FetchOutcome::Success("<header>Hi</header>".into()));
    }

    #[tokio::test]
    async fn test_fetch_http_error_is_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/footer.html"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/footer.html", server.uri());

        match fetcher.fetch(&url, TIMEOUT).await {
            FetchOutcome::Failure(reason) => {
                assert!(reason.starts_with(&format!("Failed to fetch {url}")));
                assert!(reason.contains("404"));
            }
            FetchOutcome::Success(_) => panic!("expected Failure"),
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(2000)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/slow.html", server.uri());

        match fetcher.fetch(&url, Duration::from_millis(100)).await {
            FetchOutcome::Failure(reason) => assert!(reason.contains("timeout"), "{reason}"),
            FetchOutcome::Success(_) => panic!("expected timeout Failure"),
        }
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_is_failure() {
        let fetcher = HttpFetcher::new().unwrap();
        let outcome = fetcher.fetch("not a url", TIMEOUT).await;
        assert!(matches!(outcome, FetchOutcome::Failure(r) if r.contains("invalid URL")));
    }

    #[tokio::test]
    async fn test_fetch_all_isolates_failures() {
        let server = MockServer::start().await;

        Mock::given(path("/header.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("H"))
            .mount(&server)
            .await;
        Mock::given(path("/footer.html"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(path("/sidebar.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("S"))
            .mount(&server)
            .await;

        let urls: Vec<String> = ["header", "footer", "sidebar"]
            .iter()
            .map(|n| format!("{}/{n}.html", server.uri()))
            .collect();

        let fetcher = HttpFetcher::new().unwrap();
        let outcomes = fetch_all(&fetcher, &urls, TIMEOUT).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], FetchOutcome::Success("H".into()));
        assert!(!outcomes[1].is_success());
        assert_eq!(outcomes[2], FetchOutcome::Success("S".into()));
    }

    /// Answers from a fixed table after a per-URL delay.
    struct DelayedFetcher {
        responses: HashMap<&'static str, (u64, &'static str)>,
    }

    #[async_trait]
    impl FragmentFetcher for DelayedFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> FetchOutcome {
            let (delay_ms, body) = self.responses[url];
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            FetchOutcome::Success(body.into())
        }
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_input_order() {
        let fetcher = DelayedFetcher {
            responses: HashMap::from([
                ("https://a", (120, "first")),
                ("https://b", (60, "second")),
                ("https://c", (0, "third")),
            ]),
        };

        let finished = std::sync::Mutex::new(Vec::new());
        let outcomes = fetch_all_with(
            &fetcher,
            &["https://a", "https://b", "https://c"],
            TIMEOUT,
            |i, _| finished.lock().unwrap().push(i),
        )
        .await;

        let texts: Vec<_> = outcomes.iter().filter_map(FetchOutcome::text).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(*finished.lock().unwrap(), vec![2, 1, 0]);
    }

    /// Blocks every call on a shared barrier, so it only completes if all
    /// fetches are in flight at the same time.
    struct RendezvousFetcher {
        barrier: Arc<Barrier>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FragmentFetcher for RendezvousFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.barrier.wait().await;
            FetchOutcome::Success(url.to_string())
        }
    }

    #[tokio::test]
    async fn test_fetch_all_runs_concurrently() {
        let fetcher = RendezvousFetcher {
            barrier: Arc::new(Barrier::new(3)),
            calls: AtomicUsize::new(0),
        };

        let outcomes = tokio::time::timeout(
            Duration::from_secs(2),
            fetch_all(&fetcher, &["h", "f", "s"], TIMEOUT),
        )
        .await
        .expect("fetches did not run concurrently");

        assert_eq!(outcomes.len(), 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }
}
