//! Shared types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config;
use crate::pipeline::upstream::UpstreamClient;

/// Identities tracked before expired windows are pruned.
const MAX_TRACKED_IDENTITIES: usize = 1024;

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes. The limiter sits behind a lock so
/// concurrent requests serialize their admission checks.
#[derive(Clone)]
pub struct ApiContext {
    pub upstream: Arc<UpstreamClient>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(upstream: Arc<UpstreamClient>) -> Self {
        Self {
            upstream,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                config::ANALYZE_MAX_PER_WINDOW,
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter — per-identity fixed window
// ═══════════════════════════════════════════════════════════

struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window admission limiter. Windows are created lazily per identity;
/// a request arriving after expiry starts a fresh window with count 1.
pub struct RateLimiter {
    windows: HashMap<String, RateWindow>,
    max_per_window: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_per_window: u32) -> Self {
        Self {
            windows: HashMap::new(),
            max_per_window,
            window: config::RATE_WINDOW,
        }
    }

    /// Admit or reject one request. Returns `Err(retry_after_secs)` when the
    /// identity's budget for the current window is spent.
    pub fn check(&mut self, identity: &str) -> Result<(), u64> {
        let now = Instant::now();

        if self.windows.len() > MAX_TRACKED_IDENTITIES {
            self.windows.retain(|_, w| now < w.reset_at);
        }

        match self.windows.get_mut(identity) {
            Some(w) if now < w.reset_at => {
                if w.count >= self.max_per_window {
                    let retry_after = w.reset_at.duration_since(now).as_secs().max(1);
                    return Err(retry_after);
                }
                w.count += 1;
                Ok(())
            }
            _ => {
                self.windows.insert(
                    identity.to_string(),
                    RateWindow {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_budget_then_denies() {
        let mut limiter = RateLimiter::new(config::ANALYZE_MAX_PER_WINDOW);
        for _ in 0..config::ANALYZE_MAX_PER_WINDOW {
            assert!(limiter.check("203.0.113.7").is_ok());
        }
        let denied = limiter.check("203.0.113.7");
        assert!(denied.is_err());
        assert!(denied.unwrap_err() >= 1);
    }

    #[test]
    fn expired_window_resets_count_to_one() {
        let mut limiter = RateLimiter::new(2);
        assert!(limiter.check("id").is_ok());
        assert!(limiter.check("id").is_ok());
        assert!(limiter.check("id").is_err());

        // Force the window into the past.
        limiter.windows.get_mut("id").unwrap().reset_at =
            Instant::now() - Duration::from_secs(1);

        assert!(limiter.check("id").is_ok(), "fresh window admits");
        assert_eq!(limiter.windows["id"].count, 1, "counter restarts at 1");
        assert!(limiter.check("id").is_ok());
        assert!(limiter.check("id").is_err());
    }

    #[test]
    fn identities_are_isolated() {
        let mut limiter = RateLimiter::new(1);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn facility_budget_is_looser() {
        let mut limiter = RateLimiter::new(config::FACILITY_MAX_PER_WINDOW);
        for _ in 0..config::FACILITY_MAX_PER_WINDOW {
            assert!(limiter.check("id").is_ok());
        }
        assert!(limiter.check("id").is_err());
    }

    #[test]
    fn prunes_expired_windows_when_map_grows() {
        let mut limiter = RateLimiter::new(1);
        for i in 0..=MAX_TRACKED_IDENTITIES {
            limiter.check(&format!("id-{i}")).unwrap();
        }
        for w in limiter.windows.values_mut() {
            w.reset_at = Instant::now() - Duration::from_secs(1);
        }
        limiter.check("fresh").unwrap();
        assert_eq!(limiter.windows.len(), 1, "expired windows pruned");
    }
}
