use std::error::Error as StdError;
use std::fmt::{self, Write};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::metrics::{Outcome, ProbeRecord, ResultAggregator};

static DEFAULT_USER_AGENT: OnceLock<String> = OnceLock::new();

pub(crate) fn user_agent() -> &'static str {
    DEFAULT_USER_AGENT
        .get_or_init(|| format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))
}

#[async_trait]
pub(crate) trait Executable {
    type Result;

    async fn execute(self) -> Self::Result;
}

#[derive(Debug)]
pub(crate) enum ProbeError {
    Timeout,
    Connect(reqwest::Error),
    Request(reqwest::Error),
}

impl From<reqwest::Error> for ProbeError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            ProbeError::Timeout
        } else if value.is_connect() {
            ProbeError::Connect(value)
        } else {
            ProbeError::Request(value)
        }
    }
}

/// Renders an error followed by every cause in its source chain.
fn chain(mut err: &(dyn StdError + 'static)) -> String {
    let mut s = err.to_string();
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProbeError::Timeout => write!(f, "request timed out"),
            ProbeError::Connect(e) => write!(f, "connection failed ({})", chain(e)),
            ProbeError::Request(e) => write!(f, "request failed ({})", chain(e)),
        }
    }
}

impl StdError for ProbeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ProbeError::Timeout => None,
            ProbeError::Connect(e) | ProbeError::Request(e) => Some(e),
        }
    }
}

/// Submits the record and the progress signal when dropped, so every way
/// out of a probe (classified, errored, cancelled or panicked) reports
/// exactly once.
struct Completion {
    url: Arc<str>,
    record: ProbeRecord,
    aggregator: Arc<ResultAggregator>,
    progress: UnboundedSender<()>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.aggregator.add_record(&self.url, self.record);
        // the tracker may already be gone during shutdown
        let _ = self.progress.send(());
    }
}

/// One HTTP GET against one URL.
pub(crate) struct Probe {
    url: Arc<str>,
    attempt: usize,
    timeout: Duration,
    client: reqwest::Client,
    aggregator: Arc<ResultAggregator>,
    progress: UnboundedSender<()>,
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("url", &self.url)
            .field("attempt", &self.attempt)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Probe {
    pub(crate) fn new(
        url: Arc<str>,
        attempt: usize,
        timeout: Duration,
        client: reqwest::Client,
        aggregator: Arc<ResultAggregator>,
        progress: UnboundedSender<()>,
    ) -> Self {
        Self {
            url,
            attempt,
            timeout,
            client,
            aggregator,
            progress,
        }
    }
}

#[async_trait]
impl Executable for Probe {
    type Result = Outcome;

    #[tracing::instrument(name = "probe", skip(self), fields(url = %self.url, attempt = self.attempt))]
    async fn execute(self) -> Self::Result {
        let Probe {
            url,
            timeout,
            client,
            aggregator,
            progress,
            ..
        } = self;
        let mut completion = Completion {
            url: url.clone(),
            record: ProbeRecord::error(),
            aggregator,
            progress,
        };

        let start = Instant::now();
        match client.get(&*url).timeout(timeout).send().await {
            Ok(resp) => {
                let status = resp.status();
                completion.record = ProbeRecord::classify(status, start.elapsed());
                if completion.record.is_failed() {
                    debug!(%status, "test for `{url}` is failed (got HTTP 400 or 500)");
                } else {
                    debug!(%status, "test for `{url}` is successful");
                }
            }
            Err(e) => {
                let e = ProbeError::from(e);
                error!("test for `{url}` is failed: {e}");
            }
        }
        completion.record.outcome()
    }
}

#[cfg(test)]
mod tests {
    use mockito::Server;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;

    fn probe_for(
        url: &str,
        timeout: Duration,
    ) -> (Probe, Arc<ResultAggregator>, UnboundedReceiver<()>) {
        let aggregator = Arc::new(ResultAggregator::new());
        let (sender, receiver) = mpsc::unbounded_channel();
        let probe = Probe::new(
            url.into(),
            1,
            timeout,
            reqwest::Client::new(),
            aggregator.clone(),
            sender,
        );
        (probe, aggregator, receiver)
    }

    fn signals(receiver: &mut UnboundedReceiver<()>) -> usize {
        std::iter::from_fn(|| receiver.try_recv().ok()).count()
    }

    #[tokio::test]
    async fn it_should_record_success_on_200() {
        let mut server = Server::new_async().await;
        let _m = server.mock("GET", "/ok").with_status(200).create_async().await;
        let url = format!("{}/ok", server.url());
        let (probe, aggregator, mut receiver) = probe_for(&url, Duration::from_secs(5));

        assert_eq!(probe.execute().await, Outcome::Success);

        let summary = aggregator.generate_summary();
        assert_eq!(summary[&url].success, 1);
        assert!(summary[&url].min > 0.0);
        assert_eq!(signals(&mut receiver), 1);
    }

    #[tokio::test]
    async fn it_should_record_failure_on_500() {
        let mut server = Server::new_async().await;
        let _m = server.mock("GET", "/boom").with_status(500).create_async().await;
        let url = format!("{}/boom", server.url());
        let (probe, aggregator, mut receiver) = probe_for(&url, Duration::from_secs(5));

        assert_eq!(probe.execute().await, Outcome::Failed);

        let summary = &aggregator.generate_summary()[&url];
        assert_eq!((summary.success, summary.failed, summary.errors), (0, 1, 0));
        assert_eq!(signals(&mut receiver), 1);
    }

    #[tokio::test]
    async fn it_should_count_404_as_success() {
        let mut server = Server::new_async().await;
        let _m = server.mock("GET", "/missing").with_status(404).create_async().await;
        let url = format!("{}/missing", server.url());
        let (probe, _aggregator, _receiver) = probe_for(&url, Duration::from_secs(5));

        assert_eq!(probe.execute().await, Outcome::Success);
    }

    #[tokio::test]
    async fn it_should_record_untimed_error_on_unreachable_host() {
        let url = "http://127.0.0.1:1/";
        let (probe, aggregator, mut receiver) = probe_for(url, Duration::from_secs(5));

        assert_eq!(probe.execute().await, Outcome::Error);

        let summary = &aggregator.generate_summary()[url];
        assert_eq!((summary.success, summary.failed, summary.errors), (0, 0, 1));
        assert_eq!((summary.min, summary.max, summary.avg), (0.0, 0.0, 0.0));
        assert_eq!(signals(&mut receiver), 1);
    }

    #[tokio::test]
    async fn it_should_record_error_on_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let (probe, aggregator, mut receiver) = probe_for(&url, Duration::from_millis(200));

        let handle = tokio::spawn(probe.execute());
        // hold the connection open without ever answering
        let (_socket, _) = listener.accept().await.unwrap();

        assert_eq!(handle.await.unwrap(), Outcome::Error);
        assert_eq!(aggregator.generate_summary()[&url].errors, 1);
        assert_eq!(signals(&mut receiver), 1);
    }

    #[tokio::test]
    async fn it_should_report_once_when_aborted_mid_flight() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let (probe, aggregator, mut receiver) = probe_for(&url, Duration::from_secs(30));

        let handle = tokio::spawn(probe.execute());
        let (_socket, _) = listener.accept().await.unwrap();
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        assert_eq!(aggregator.records_for(&url), 1);
        assert_eq!(aggregator.generate_summary()[&url].errors, 1);
        assert_eq!(signals(&mut receiver), 1);
    }

    #[test]
    fn it_should_describe_timeouts() {
        assert_eq!(ProbeError::Timeout.to_string(), "request timed out");
    }
}
