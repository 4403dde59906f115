//! Global throttle for outbound market-data requests.
//!
//! Two limits apply to every request regardless of provider:
//! - a minimum spacing between consecutive requests
//! - a cap on requests within any rolling hour
//!
//! `acquire` waits until both allow another request instead of failing.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant};

const HOUR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    // 0 disables the hourly cap
    hourly_cap: usize,
    state: Mutex<LimiterState>,
}

#[derive(Debug, Default)]
struct LimiterState {
    last_request: Option<Instant>,
    window: VecDeque<Instant>,
}

impl LimiterState {
    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.saturating_duration_since(*front) >= HOUR {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration, hourly_cap: u32) -> Self {
        Self {
            min_interval,
            hourly_cap: hourly_cap as usize,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// No spacing and no cap.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub async fn acquire(&self) {
        let mut st = self.state.lock().await;

        loop {
            let now = Instant::now();
            st.prune(now);

            let spacing_wait = st
                .last_request
                .map(|last| (last + self.min_interval).saturating_duration_since(now))
                .unwrap_or(Duration::ZERO);

            let cap_wait = match st.window.front() {
                Some(oldest) if self.hourly_cap > 0 && st.window.len() >= self.hourly_cap => {
                    (*oldest + HOUR).saturating_duration_since(now)
                }
                _ => Duration::ZERO,
            };

            if cap_wait > Duration::ZERO {
                tracing::warn!(
                    "hourly request cap ({}) reached, waiting {}s",
                    self.hourly_cap,
                    cap_wait.as_secs()
                );
            }

            let wait = spacing_wait.max(cap_wait);
            if wait.is_zero() {
                break;
            }
            time::sleep(wait).await;
        }

        let now = Instant::now();
        st.last_request = Some(now);
        st.window.push_back(now);
    }

    /// Requests recorded within the last hour.
    pub async fn recent_requests(&self) -> usize {
        let mut st = self.state.lock().await;
        st.prune(Instant::now());
        st.window.len()
    }
}
