//! Combined rolling-window and concurrency rate limiting for API
//! repositories.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Duration, Instant};
use tracing::debug;

/// The rolling window over which `requests_per_minute` is enforced.
const WINDOW: Duration = Duration::from_secs(60);

/// At most `requests_per_minute` acquisitions per rolling 60-second window,
/// and at most `concurrent_requests` permits outstanding at once.
///
/// The timestamp queue and its expiry math run under a single mutex; the
/// semaphore bounds concurrency independently, and the returned permit holds
/// its slot for as long as the caller keeps it (the duration of the outer
/// request).
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: u32,
    semaphore: Arc<Semaphore>,
    window: tokio::sync::Mutex<VecDeque<Instant>>,
}

/// Holds one concurrency slot; dropped when the request completes.
#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, concurrent_requests: usize) -> Self {
        Self {
            requests_per_minute,
            semaphore: Arc::new(Semaphore::new(concurrent_requests.max(1))),
            window: tokio::sync::Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a request may be issued, then record it.
    pub async fn acquire(&self) -> RateLimitPermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("rate limiter semaphore is never closed");

        let mut window = self.window.lock().await;
        let now = Instant::now();
        prune(&mut window, now);

        if window.len() >= self.requests_per_minute as usize {
            if let Some(oldest) = window.front().copied() {
                let elapsed = now.duration_since(oldest);
                if elapsed < WINDOW {
                    let wait = WINDOW - elapsed;
                    debug!("Rate limit reached, waiting {:.2}s", wait.as_secs_f64());
                    tokio::time::sleep(wait).await;
                }
                prune(&mut window, Instant::now());
            }
        }

        window.push_back(Instant::now());
        RateLimitPermit { _permit: permit }
    }
}

/// Drop timestamps older than one window.
fn prune(window: &mut VecDeque<Instant>, now: Instant) {
    let Some(cutoff) = now.checked_sub(WINDOW) else {
        return;
    };
    while window.front().is_some_and(|&t| t <= cutoff) {
        window.pop_front();
    }
}
