//! 제공자별 고정 윈도우 요청 한도.
//!
//! 윈도우는 첫 요청 시점에 시작되어 기간이 지나면 초기화됩니다
//! (Redis `INCR` + `EXPIRE` 카운터와 같은 방식). 분/시간/일 윈도우를
//! 함께 설정할 수 있으며, 모든 윈도우에 여유가 있을 때만 요청을 허용합니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// 단일 윈도우 한도.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    /// 윈도우당 최대 요청 수
    pub limit: u32,
    /// 윈도우 길이
    pub period: Duration,
}

/// 제공자 요청 한도 정책.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    windows: Vec<WindowLimit>,
}

impl RateLimitPolicy {
    /// 분당 한도만 있는 정책.
    pub fn per_minute(limit: u32) -> Self {
        Self {
            windows: vec![WindowLimit {
                limit,
                period: Duration::from_secs(60),
            }],
        }
    }

    /// 시간당 한도를 추가합니다.
    #[must_use]
    pub fn with_hourly(self, limit: Option<u32>) -> Self {
        self.with_window(limit, Duration::from_secs(3_600))
    }

    /// 일일 한도를 추가합니다.
    #[must_use]
    pub fn with_daily(self, limit: Option<u32>) -> Self {
        self.with_window(limit, Duration::from_secs(86_400))
    }

    /// 임의 길이의 윈도우를 추가합니다.
    #[must_use]
    pub fn with_window(mut self, limit: Option<u32>, period: Duration) -> Self {
        if let Some(limit) = limit {
            self.windows.push(WindowLimit { limit, period });
        }
        self
    }

    pub fn windows(&self) -> &[WindowLimit] {
        &self.windows
    }
}

/// 요청 허용 여부.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// 허용됨. `remaining`은 가장 빡빡한 윈도우의 남은 요청 수
    Allowed { remaining: u32 },
    /// 한도 소진. 가장 늦게 풀리는 차단 윈도우까지 대기 시간
    Exhausted { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }

    /// 재시도 대기 시간 (초, 올림). 허용된 경우 `None`.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RateLimitDecision::Allowed { .. } => None,
            RateLimitDecision::Exhausted { retry_after } => Some(ceil_secs(*retry_after)),
        }
    }
}

#[derive(Debug)]
struct WindowState {
    limit: WindowLimit,
    started: Option<Instant>,
    count: u32,
}

impl WindowState {
    /// 윈도우가 지났으면 초기화합니다.
    fn roll(&mut self, now: Instant) {
        if let Some(started) = self.started {
            if now.duration_since(started) >= self.limit.period {
                self.started = None;
                self.count = 0;
            }
        }
    }

    fn remaining(&self) -> u32 {
        self.limit.limit.saturating_sub(self.count)
    }

    fn resets_in(&self, now: Instant) -> Duration {
        match self.started {
            Some(started) => (started + self.limit.period).saturating_duration_since(now),
            None => self.limit.period,
        }
    }
}

/// 윈도우별 사용량.
#[derive(Debug, Clone, Serialize)]
pub struct WindowUsage {
    pub period_secs: u64,
    pub limit: u32,
    pub used: u32,
    pub resets_in_secs: u64,
}

/// 요청 한도 통계.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub provider: String,
    pub allowed: u64,
    pub rejected: u64,
    pub windows: Vec<WindowUsage>,
}

/// 고정 윈도우 카운터.
pub struct FixedWindowLimiter {
    provider: String,
    windows: Mutex<Vec<WindowState>>,
    allowed: AtomicU64,
    rejected: AtomicU64,
}

impl FixedWindowLimiter {
    pub fn new(provider: impl Into<String>, policy: RateLimitPolicy) -> Self {
        let windows = policy
            .windows
            .into_iter()
            .map(|limit| WindowState {
                limit,
                started: None,
                count: 0,
            })
            .collect();

        Self {
            provider: provider.into(),
            windows: Mutex::new(windows),
            allowed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// 요청 하나를 허용할지 결정하고, 허용되면 모든 윈도우 카운터를 증가시킵니다.
    pub async fn try_acquire(&self) -> RateLimitDecision {
        self.try_acquire_n(1).await
    }

    /// 요청 `cost`개를 한 번에 허용할지 결정합니다.
    ///
    /// 모든 윈도우에 `cost`만큼 여유가 있을 때만 허용하며, 거부된 경우
    /// 카운터는 변하지 않습니다.
    pub async fn try_acquire_n(&self, cost: u32) -> RateLimitDecision {
        let cost = cost.max(1);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        for window in windows.iter_mut() {
            window.roll(now);
        }

        let blocking = windows
            .iter()
            .filter(|w| w.remaining() < cost)
            .map(|w| w.resets_in(now))
            .max();

        if let Some(retry_after) = blocking {
            self.rejected.fetch_add(u64::from(cost), Ordering::Relaxed);
            counter!("feed_rate_limit_rejected_total", "provider" => self.provider.clone())
                .increment(u64::from(cost));
            warn!(
                provider = %self.provider,
                cost,
                retry_after_secs = ceil_secs(retry_after),
                "요청 한도 소진"
            );
            return RateLimitDecision::Exhausted { retry_after };
        }

        let mut remaining = u32::MAX;
        for window in windows.iter_mut() {
            window.started.get_or_insert(now);
            window.count += cost;
            remaining = remaining.min(window.remaining());
        }

        self.allowed.fetch_add(u64::from(cost), Ordering::Relaxed);
        debug!(provider = %self.provider, cost, remaining, "요청 허용");
        RateLimitDecision::Allowed { remaining }
    }

    /// 지금 허용될 수 있는 요청 수 (가장 빡빡한 윈도우 기준).
    pub async fn available(&self) -> u32 {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        windows
            .iter_mut()
            .map(|w| {
                w.roll(now);
                w.remaining()
            })
            .min()
            .unwrap_or(u32::MAX)
    }

    /// 현재 통계.
    pub async fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let usage = windows
            .iter_mut()
            .map(|w| {
                w.roll(now);
                WindowUsage {
                    period_secs: w.limit.period.as_secs(),
                    limit: w.limit.limit,
                    used: w.count,
                    resets_in_secs: ceil_secs(w.resets_in(now)),
                }
            })
            .collect();

        RateLimiterStats {
            provider: self.provider.clone(),
            allowed: self.allowed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            windows: usage,
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}
