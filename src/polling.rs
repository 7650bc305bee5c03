//! Waiting for remote file processing
//!
//! Uploaded media is not usable until the file store reports it ACTIVE.
//! Polling is bounded by a maximum wait, follows a fixed or Fibonacci
//! backoff, and stops early when the cancellation token fires.

use crate::ai::{FileState, FileStoreService, RemoteFile};
use crate::{Error, Result};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tokio_retry::strategy::{FibonacciBackoff, FixedInterval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Fibonacci,
}

impl FromStr for Backoff {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Backoff::Fixed),
            "fibonacci" => Ok(Backoff::Fibonacci),
            other => Err(Error::Config(format!(
                "POLL_BACKOFF must be 'fixed' or 'fibonacci', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Upper bound on a single delay when backing off.
    pub max_interval: Duration,
    pub backoff: Backoff,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(60),
            backoff: Backoff::Fixed,
            max_wait: Duration::from_secs(1800),
        }
    }
}

impl PollPolicy {
    fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let millis = u64::try_from(self.interval.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);

        match self.backoff {
            Backoff::Fixed => Box::new(FixedInterval::from_millis(millis)),
            Backoff::Fibonacci => Box::new(
                FibonacciBackoff::from_millis(millis)
                    .max_delay(self.max_interval.max(self.interval)),
            ),
        }
    }
}

/// Poll `file` until it leaves PROCESSING.
///
/// Returns the refreshed handle when usable. FAILED yields
/// [`Error::ProcessingFailed`] carrying the state name.
pub async fn wait_until_ready(
    files: &dyn FileStoreService,
    file: RemoteFile,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<RemoteFile> {
    let started = Instant::now();
    let mut delays = policy.delays();
    let mut file = file;

    while file.state == FileState::Processing {
        let elapsed = started.elapsed();
        if elapsed >= policy.max_wait {
            return Err(Error::ProcessingTimeout {
                name: file.name,
                waited_secs: elapsed.as_secs(),
            });
        }

        let delay = delays
            .next()
            .unwrap_or(policy.interval)
            .min(policy.max_wait - elapsed);
        debug!("{} still processing, checking again in {:?}", file.name, delay);

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        file = files.get_file(&file.name).await?;
    }

    match file.state {
        FileState::Failed => Err(Error::ProcessingFailed(file.state.as_str().to_string())),
        _ => {
            info!(
                "{} ready in state {} after {:?}",
                file.name,
                file.state.as_str(),
                started.elapsed()
            );
            Ok(file)
        }
    }
}
