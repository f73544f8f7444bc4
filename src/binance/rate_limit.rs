// =============================================================================
// Request Budget: rolling-window weight limiter for Binance REST calls
// =============================================================================
//
// Two limits are enforced:
//   - A local rolling window (`max_weight` per `window`). A request that does
//     not fit waits until enough earlier spend ages out. Nothing is dropped.
//   - The exchange-reported `X-MBX-USED-WEIGHT-1M` header. Above the hard
//     ceiling the client fails fast so the caller backs off.
//
// The spend log is a short VecDeque behind a parking_lot mutex; the lock is
// never held across an await.
// =============================================================================

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Server-reported weight at which requests are refused locally.
const WEIGHT_HARD_LIMIT: u32 = 2200;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 1800;
/// A header reading older than this no longer describes the current minute.
const SERVER_WEIGHT_TTL: Duration = Duration::from_secs(60);

/// Request weight for `GET /fapi/v1/klines` by `limit`.
pub fn klines_weight(limit: usize) -> u32 {
    match limit {
        0..=99 => 1,
        100..=499 => 2,
        500..=1000 => 5,
        _ => 10,
    }
}

/// Rolling-window weight budget shared by every request of one client.
pub struct RequestBudget {
    max_weight: u32,
    window: Duration,
    spent: Mutex<VecDeque<(Instant, u32)>>,
    server_weight: Mutex<Option<(Instant, u32)>>,
}

/// Serialisable view of the budget state.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetSnapshot {
    pub max_weight: u32,
    pub window_ms: u64,
    pub spent_in_window: u32,
    pub server_used_weight_1m: Option<u32>,
}

impl RequestBudget {
    pub fn new(max_weight: u32, window: Duration) -> Self {
        Self {
            max_weight: max_weight.max(1),
            window,
            spent: Mutex::new(VecDeque::new()),
            server_weight: Mutex::new(None),
        }
    }

    // -------------------------------------------------------------------------
    // Local window
    // -------------------------------------------------------------------------

    /// Wait until `weight` fits in the window, then record it.
    ///
    /// A weight larger than the whole budget is clamped so it can still be
    /// sent once the window is empty.
    pub async fn acquire(&self, weight: u32) {
        let weight = weight.clamp(1, self.max_weight);
        loop {
            let ready_at = {
                let mut spent = self.spent.lock();
                let now = Instant::now();
                prune(&mut spent, now, self.window);

                let used: u32 = spent.iter().map(|(_, w)| *w).sum();
                if used + weight <= self.max_weight {
                    spent.push_back((now, weight));
                    return;
                }

                // Earliest instant at which enough old spend has expired.
                let mut remaining = used;
                let mut ready_at = now;
                for &(at, w) in spent.iter() {
                    remaining -= w;
                    ready_at = at + self.window;
                    if remaining + weight <= self.max_weight {
                        break;
                    }
                }
                debug!(
                    used,
                    requested = weight,
                    max_weight = self.max_weight,
                    wait_ms = ready_at.saturating_duration_since(now).as_millis() as u64,
                    "request budget exhausted, waiting"
                );
                ready_at
            };
            tokio::time::sleep_until(ready_at).await;
        }
    }

    /// Weight spent inside the current window.
    pub fn spent_in_window(&self) -> u32 {
        let mut spent = self.spent.lock();
        prune(&mut spent, Instant::now(), self.window);
        spent.iter().map(|(_, w)| *w).sum()
    }

    // -------------------------------------------------------------------------
    // Header-based tracking
    // -------------------------------------------------------------------------

    /// Record the `X-MBX-USED-WEIGHT-1M` header from a response.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(w) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };
        self.record_server_weight(w);
    }

    pub fn record_server_weight(&self, w: u32) {
        let prev = self
            .server_weight
            .lock()
            .replace((Instant::now(), w))
            .map(|(_, p)| p)
            .unwrap_or(0);

        if w >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = w,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = w, "rate-limit weight updated from header");
    }

    /// Last server-reported weight, if it still describes the current minute.
    pub fn server_used_weight(&self) -> Option<u32> {
        let guard = self.server_weight.lock();
        guard
            .filter(|(at, _)| at.elapsed() < SERVER_WEIGHT_TTL)
            .map(|(_, w)| w)
    }

    /// Remaining wait if the exchange-reported weight is at the hard ceiling.
    pub fn server_cooldown(&self) -> Option<Duration> {
        let guard = self.server_weight.lock();
        match *guard {
            Some((at, w)) if w >= WEIGHT_HARD_LIMIT && at.elapsed() < SERVER_WEIGHT_TTL => {
                Some(SERVER_WEIGHT_TTL.saturating_sub(at.elapsed()))
            }
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            max_weight: self.max_weight,
            window_ms: self.window.as_millis() as u64,
            spent_in_window: self.spent_in_window(),
            server_used_weight_1m: self.server_used_weight(),
        }
    }
}

fn prune(spent: &mut VecDeque<(Instant, u32)>, now: Instant, window: Duration) {
    while let Some(&(at, _)) = spent.front() {
        if now.saturating_duration_since(at) >= window {
            spent.pop_front();
        } else {
            break;
        }
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget")
            .field("max_weight", &self.max_weight)
            .field("window", &self.window)
            .field("spent_in_window", &self.spent_in_window())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn klines_weight_follows_limit_bands() {
        assert_eq!(klines_weight(10), 1);
        assert_eq!(klines_weight(100), 2);
        assert_eq!(klines_weight(499), 2);
        assert_eq!(klines_weight(1000), 5);
        assert_eq!(klines_weight(1500), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_within_budget_do_not_wait() {
        let budget = RequestBudget::new(10, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..10 {
            budget.acquire(1).await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(budget.spent_in_window(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn excess_requests_are_delayed_not_dropped() {
        let budget = RequestBudget::new(5, Duration::from_secs(1));
        let mut times = Vec::new();
        for _ in 0..17 {
            budget.acquire(1).await;
            times.push(Instant::now());
        }
        assert_eq!(times.len(), 17);
        // Any 6 consecutive grants span at least one full window.
        for i in 0..times.len() - 5 {
            assert!(times[i + 5] - times[i] >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_never_exceed_window() {
        let budget = Arc::new(RequestBudget::new(4, Duration::from_millis(500)));
        let mut handles = Vec::new();
        for i in 0..12u32 {
            let budget = budget.clone();
            handles.push(tokio::spawn(async move {
                let w = 1 + i % 2;
                budget.acquire(w).await;
                (Instant::now(), w)
            }));
        }
        let mut grants = Vec::new();
        for h in handles {
            grants.push(h.await.unwrap());
        }
        grants.sort_by_key(|(at, _)| *at);

        for (i, &(start, _)) in grants.iter().enumerate() {
            let in_window: u32 = grants[i..]
                .iter()
                .take_while(|(at, _)| *at - start < Duration::from_millis(500))
                .map(|(_, w)| *w)
                .sum();
            assert!(in_window <= 4, "window starting at grant {i} spent {in_window}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_weight_is_clamped() {
        let budget = RequestBudget::new(3, Duration::from_secs(1));
        budget.acquire(50).await;
        assert_eq!(budget.spent_in_window(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn server_weight_ceiling_expires() {
        let budget = RequestBudget::new(10, Duration::from_secs(1));
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", "2300".parse().unwrap());
        budget.update_from_headers(&headers);

        assert_eq!(budget.server_used_weight(), Some(2300));
        assert!(budget.server_cooldown().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(budget.server_used_weight(), None);
        assert!(budget.server_cooldown().is_none());
    }

    #[test]
    fn below_ceiling_has_no_cooldown() {
        let budget = RequestBudget::new(10, Duration::from_secs(1));
        budget.record_server_weight(100);
        assert!(budget.server_cooldown().is_none());
        assert_eq!(budget.snapshot().server_used_weight_1m, Some(100));
    }
}
