use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{Outcome, ResultAggregator, SummaryReport};
use crate::probe::{self, Executable, Probe};
use crate::progress::ProgressTracker;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub(crate) enum RunOutcome {
    Completed(SummaryReport),
    /// Shutdown was requested; holds whatever was recorded until then.
    Interrupted(SummaryReport),
}

/// Fans out `count` probes for every host and gathers their results.
#[derive(Debug)]
pub(crate) struct Orchestrator {
    hosts: Vec<String>,
    count: usize,
    total: usize,
    timeout: Duration,
    progress_interval: Duration,
}

impl Orchestrator {
    pub(crate) fn new(hosts: Vec<String>, count: usize) -> anyhow::Result<Self> {
        if hosts.is_empty() {
            bail!("no hosts to probe");
        }
        if count == 0 {
            bail!("amount of requests per host must be at least 1");
        }
        let Some(total) = hosts.len().checked_mul(count) else {
            bail!("too many requests: {} hosts with {count} requests each", hosts.len());
        };
        Ok(Self {
            hosts,
            count,
            total,
            timeout: DEFAULT_TIMEOUT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        })
    }

    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub(crate) fn total_attempts(&self) -> usize {
        self.total
    }

    /// Runs every probe to completion, or until `shutdown` flips to `true`.
    #[instrument(skip_all, fields(hosts = self.hosts.len(), count = self.count))]
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<RunOutcome> {
        let total = self.total_attempts();
        let aggregator = Arc::new(ResultAggregator::new());
        let (progress_sender, progress_receiver) = mpsc::unbounded_channel();
        let (start_signal_sender, start_signal_receiver) = watch::channel(());

        // creating a client is an expensive task, so every probe shares one
        let client = reqwest::Client::builder()
            .user_agent(probe::user_agent())
            .build()
            .context("error creating HTTP client")?;

        let start = Instant::now();
        let mut probes: Vec<JoinHandle<Outcome>> = Vec::with_capacity(total);
        for host in &self.hosts {
            let url: Arc<str> = host.as_str().into();
            for attempt in 1..=self.count {
                let probe = Probe::new(
                    url.clone(),
                    attempt,
                    self.timeout,
                    client.clone(),
                    aggregator.clone(),
                    progress_sender.clone(),
                );
                let mut start_signal = start_signal_receiver.clone();
                probes.push(tokio::spawn(async move {
                    // a dropped sender also releases the probe
                    let _ = start_signal.changed().await;
                    probe.execute().await
                }));
            }
        }
        // only probes may keep the channel open
        drop(progress_sender);
        debug!("time creating {} probes: {:?}", total, start.elapsed());

        let tracker = tokio::spawn(
            ProgressTracker::new(total, self.progress_interval, progress_receiver).run(),
        );

        info!("starting {} requests", total);
        let _ = start_signal_sender.send(());

        let interrupted = tokio::select! {
            results = join_all(probes.iter_mut()) => {
                for result in results {
                    if let Err(e) = result {
                        warn!("probe task ended abnormally: {e}");
                    }
                }
                false
            }
            _ = shutdown_requested(&mut shutdown) => true,
        };

        if interrupted {
            aggregator.seal();
            for probe in &probes {
                probe.abort();
            }
            tracker.abort();
            info!(
                recorded = aggregator.total_records(),
                expected = total,
                "probing interrupted"
            );
            return Ok(RunOutcome::Interrupted(aggregator.generate_summary()));
        }

        match tracker.await {
            Ok(progress) => debug!("tracker finished at {progress}"),
            Err(e) => warn!("progress tracker failed: {e}"),
        }
        info!("all {} requests done in {:?}", total, start.elapsed());

        Ok(RunOutcome::Completed(aggregator.generate_summary()))
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let requested = *shutdown.borrow_and_update();
        if requested {
            return;
        }
        if shutdown.changed().await.is_err() {
            // nobody can ask for a shutdown anymore
            std::future::pending::<()>().await;
        }
    }
}
