use analysis_core::RateLimits;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Default)]
struct CallLog {
    calls: VecDeque<Instant>,
}

impl CallLog {
    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.calls.front() {
            if now.duration_since(front) >= DAY {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn count_within(&self, now: Instant, window: Duration) -> u32 {
        self.calls
            .iter()
            .rev()
            .take_while(|t| now.duration_since(**t) < window)
            .count() as u32
    }
}

/// Sliding-window call counts per quota key.
///
/// Keys are provider quota keys, so providers on one upstream account share a bucket.
/// Shared between engines when one upstream quota backs several domains.
#[derive(Default)]
pub struct QuotaTracker {
    logs: DashMap<String, CallLog>,
}

fn headroom(limits: &RateLimits, minute: u32, day: u32) -> Option<u32> {
    if limits.calls_per_minute.is_none() && limits.calls_per_day.is_none() {
        return None;
    }
    let minute_left = limits.calls_per_minute.map_or(u32::MAX, |l| l.saturating_sub(minute));
    let day_left = limits.calls_per_day.map_or(u32::MAX, |l| l.saturating_sub(day));
    Some(minute_left.min(day_left))
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: &str) {
        let now = Instant::now();
        let mut log = self.logs.entry(key.to_string()).or_default();
        log.prune(now);
        log.calls.push_back(now);
    }

    /// Records `calls` against `key` only if both windows have room for all of them.
    ///
    /// Check and record happen under the bucket's lock, so concurrent callers cannot
    /// overdraw. Unknown headroom always admits.
    pub fn try_acquire(&self, key: &str, limits: &RateLimits, calls: u32) -> bool {
        let now = Instant::now();
        let mut log = self.logs.entry(key.to_string()).or_default();
        log.prune(now);
        let minute = log.count_within(now, MINUTE);
        let day = log.calls.len() as u32;
        if let Some(left) = headroom(limits, minute, day) {
            if left < calls {
                return false;
            }
        }
        log.calls.extend(std::iter::repeat(now).take(calls as usize));
        true
    }

    /// Calls made in the last minute and the last day.
    pub fn used(&self, key: &str) -> (u32, u32) {
        let now = Instant::now();
        match self.logs.get_mut(key) {
            Some(mut log) => {
                log.prune(now);
                (log.count_within(now, MINUTE), log.calls.len() as u32)
            }
            None => (0, 0),
        }
    }

    /// Calls left before the tighter of the two windows is full.
    ///
    /// `None` when neither limit is declared, i.e. the headroom is unknown.
    /// A single undeclared window is treated as uncapped.
    pub fn remaining(&self, key: &str, limits: &RateLimits) -> Option<u32> {
        let (minute, day) = self.used(key);
        headroom(limits, minute, day)
    }
}

/// Operator override of a provider's declared limits. Unset sides keep the declared value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitOverride {
    pub calls_per_minute: Option<u32>,
    pub calls_per_day: Option<u32>,
}

impl RateLimitOverride {
    pub fn apply(&self, declared: RateLimits) -> RateLimits {
        RateLimits {
            calls_per_minute: self.calls_per_minute.or(declared.calls_per_minute),
            calls_per_day: self.calls_per_day.or(declared.calls_per_day),
            tier: declared.tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_counts_down() {
        let quota = QuotaTracker::new();
        let limits = RateLimits::new(Some(5), Some(500), "free");
        assert_eq!(quota.remaining("alpha_vantage", &limits), Some(5));

        for _ in 0..3 {
            quota.record("alpha_vantage");
        }
        assert_eq!(quota.used("alpha_vantage"), (3, 3));
        assert_eq!(quota.remaining("alpha_vantage", &limits), Some(2));
        assert_eq!(quota.remaining("polygon", &limits), Some(5));
    }

    #[test]
    fn test_daily_limit_dominates() {
        let quota = QuotaTracker::new();
        quota.record("alpha_vantage");
        let limits = RateLimits::new(Some(5), Some(1), "free");
        assert_eq!(quota.remaining("alpha_vantage", &limits), Some(0));
    }

    #[test]
    fn test_unknown_limits() {
        let quota = QuotaTracker::new();
        assert_eq!(quota.remaining("x", &RateLimits::unknown("?")), None);
        assert_eq!(quota.remaining("x", &RateLimits::new(Some(5), None, "per-minute")), Some(5));
    }

    #[test]
    fn test_try_acquire_is_all_or_nothing() {
        let quota = QuotaTracker::new();
        let limits = RateLimits::new(Some(5), None, "polygon");

        assert!(quota.try_acquire("polygon", &limits, 3));
        assert!(!quota.try_acquire("polygon", &limits, 3));
        assert_eq!(quota.remaining("polygon", &limits), Some(2));
        assert!(quota.try_acquire("polygon", &limits, 2));
        assert!(!quota.try_acquire("polygon", &limits, 1));
        assert!(quota.try_acquire("other", &limits, 1));
    }

    #[test]
    fn test_try_acquire_admits_unknown_headroom() {
        let quota = QuotaTracker::new();
        for _ in 0..10 {
            assert!(quota.try_acquire("x", &RateLimits::unknown("?"), 1));
        }
        assert_eq!(quota.used("x"), (10, 10));
    }

    #[test]
    fn test_override_keeps_unset_sides() {
        let declared = RateLimits::new(Some(5), Some(500), "free");
        let ov = RateLimitOverride {
            calls_per_minute: Some(75),
            calls_per_day: None,
        };
        let applied = ov.apply(declared);
        assert_eq!(applied.calls_per_minute, Some(75));
        assert_eq!(applied.calls_per_day, Some(500));
        assert_eq!(applied.tier, "free");
    }
}
