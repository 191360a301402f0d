//! Render accounting and concurrency limiting.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Semaphore;

/// How many in-flight URLs the summary lists before truncating.
const SUMMARY_IN_FLIGHT: usize = 3;

#[derive(Debug, Default)]
struct TrackerState {
    requests: u64,
    failures: u64,
    last_failure: Option<(String, String)>,
    in_flight: Vec<String>,
}

/// Point-in-time copy of the tracker counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub requests: u64,
    pub failures: u64,
    /// `(url, error)` of the most recent failure.
    pub last_failure: Option<(String, String)>,
    /// URLs currently rendering, oldest first. A URL rendered twice at once
    /// appears twice.
    pub in_flight: Vec<String>,
}

impl fmt::Display for RenderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requests == 0 {
            return f.write_str("no renders yet");
        }
        write!(f, "{} renders requested, {} failed", self.requests, self.failures)?;
        if let Some((url, error)) = &self.last_failure {
            write!(f, " (last: {url}: {error})")?;
        }
        if !self.in_flight.is_empty() {
            let shown: Vec<&str> = self.in_flight.iter().take(SUMMARY_IN_FLIGHT).map(String::as_str).collect();
            write!(f, ", {} in flight: {}", self.in_flight.len(), shown.join(", "))?;
            if self.in_flight.len() > SUMMARY_IN_FLIGHT {
                write!(f, " (+{} more)", self.in_flight.len() - SUMMARY_IN_FLIGHT)?;
            }
        }
        Ok(())
    }
}

/// Counts renders and caps how many run at once.
///
/// Callers over the cap wait on a semaphore; they count as requested but are
/// not in flight until they get a slot.
#[derive(Debug)]
pub struct RenderTracker {
    limit: Option<Semaphore>,
    state: Mutex<TrackerState>,
}

/// Removes its URL from the in-flight list when dropped, so a cancelled
/// render does not linger there.
struct InFlight<'a> {
    tracker: &'a RenderTracker,
    url: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.tracker.lock();
        if let Some(pos) = state.in_flight.iter().position(|u| *u == self.url) {
            state.in_flight.remove(pos);
        }
    }
}

impl Default for RenderTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RenderTracker {
    /// Create a tracker. `None` means no concurrency limit.
    pub fn new(max_concurrent: Option<usize>) -> Self {
        Self { limit: max_concurrent.map(|n| Semaphore::new(n.max(1))), state: Mutex::new(TrackerState::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `render` for `url`, counting it and respecting the limit.
    ///
    /// Errors are counted and returned unchanged.
    pub async fn record<T, E, F, Fut>(&self, url: &str, render: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.lock().requests += 1;

        let _permit = match &self.limit {
            Some(limit) => limit.acquire().await.ok(),
            None => None,
        };

        self.lock().in_flight.push(url.to_string());
        let _in_flight = InFlight { tracker: self, url: url.to_string() };

        let result = render().await;
        if let Err(e) = &result {
            let mut state = self.lock();
            state.failures += 1;
            state.last_failure = Some((url.to_string(), e.to_string()));
            tracing::warn!(url, error = %e, failures = state.failures, "render failed");
        }
        result
    }

    pub fn stats(&self) -> RenderStats {
        let state = self.lock();
        RenderStats {
            requests: state.requests,
            failures: state.failures,
            last_failure: state.last_failure.clone(),
            in_flight: state.in_flight.clone(),
        }
    }
}

impl fmt::Display for RenderTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.stats().fmt(f)
    }
}
