//! Readiness probing: status endpoint access and the polling loop.

mod predicates;

use std::thread;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

pub use predicates::{
    CLUSTERMGR_STAT_URL, CONSUL_LEADER_URL, blobnode_ready, consul_has_leader, proxy_ready,
    raft_member_ready, scheduler_ready, shardnode_ready,
};

const PROBE_TARGET: &str = "vstart_engine::probe";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetches JSON documents from service status endpoints.
#[cfg_attr(test, mockall::automock)]
pub trait StatusClient: Send + Sync {
    /// Issues a GET against `url`. Transport failures, non-200 responses and
    /// undecodable bodies all yield `None`.
    fn get_json(&self, url: &str) -> Option<Value>;
}

/// Errors raised while building the HTTP client.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The HTTP client could not be initialised.
    #[error("failed to build status client: {0}")]
    Client(#[from] reqwest::Error),
}

/// [`StatusClient`] backed by reqwest's blocking client.
#[derive(Debug, Clone)]
pub struct HttpStatusClient {
    client: Client,
}

impl HttpStatusClient {
    /// Builds a client with a five second request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Client`] when the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, ProbeError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

impl StatusClient for HttpStatusClient {
    fn get_json(&self, url: &str) -> Option<Value> {
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(error) => {
                trace!(target: PROBE_TARGET, url, %error, "status request failed");
                return None;
            }
        };
        if response.status() != StatusCode::OK {
            trace!(target: PROBE_TARGET, url, status = %response.status(), "status endpoint not ready");
            return None;
        }
        response
            .json::<Value>()
            .map_err(|error| trace!(target: PROBE_TARGET, url, %error, "status body undecodable"))
            .ok()
    }
}

/// A readiness wait gave up before the service became healthy.
#[derive(Debug, Error)]
#[error("{service} did not become ready within {}s", waited.as_secs())]
pub struct PollTimeout {
    /// Service being awaited.
    pub service: String,
    /// Time spent waiting.
    pub waited: Duration,
}

/// Fixed-interval polling loop with an optional deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    deadline: Option<Duration>,
    settle: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), None, Duration::from_secs(1))
    }
}

impl Poller {
    /// Builds a poller. `deadline = None` waits forever.
    #[must_use]
    pub const fn new(interval: Duration, deadline: Option<Duration>, settle: Duration) -> Self {
        Self {
            interval,
            deadline,
            settle,
        }
    }

    /// Interval between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on a single wait.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Calls `ready` until it returns `true`, sleeping between attempts.
    ///
    /// # Errors
    ///
    /// Returns [`PollTimeout`] once the configured deadline has elapsed.
    pub fn wait_until<F>(&self, service: &str, mut ready: F) -> Result<(), PollTimeout>
    where
        F: FnMut() -> bool,
    {
        let started = Instant::now();
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            if ready() {
                debug!(target: PROBE_TARGET, service, attempts, "service ready");
                return Ok(());
            }
            let waited = started.elapsed();
            if let Some(deadline) = self.deadline
                && waited >= deadline
            {
                return Err(PollTimeout {
                    service: service.to_owned(),
                    waited,
                });
            }
            trace!(target: PROBE_TARGET, service, attempts, "service not ready yet");
            thread::sleep(self.interval);
        }
    }

    /// Pauses for the settle interval used by services without a probe.
    pub fn settle(&self) {
        thread::sleep(self.settle);
    }
}
