//! Rate limiter for login attempts
//!
//! Two sliding windows guard the login endpoint:
//! - failed attempts per username (`auth.max_failed_logins` within
//!   `auth.lockout_minutes`)
//! - login requests per client IP (10 per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AuthConfig;

/// Login requests allowed per IP within [`IP_WINDOW_SECONDS`]
pub const MAX_IP_REQUESTS: usize = 10;
pub const IP_WINDOW_SECONDS: i64 = 60;

/// Login rate limiter
pub struct LoginRateLimiter {
    /// Failed login attempts by lowercased username or email
    username_attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    /// Login requests by client address
    ip_attempts: Arc<RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>>,
    max_failed_logins: usize,
    lockout: Duration,
}

impl LoginRateLimiter {
    pub fn new(max_failed_logins: usize, lockout_minutes: i64) -> Self {
        Self {
            username_attempts: Arc::new(RwLock::new(HashMap::new())),
            ip_attempts: Arc::new(RwLock::new(HashMap::new())),
            max_failed_logins: max_failed_logins.max(1),
            lockout: Duration::minutes(lockout_minutes.max(1)),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.max_failed_logins, config.lockout_minutes)
    }

    /// Minutes a locked-out username has to wait at most
    pub fn lockout_minutes(&self) -> i64 {
        self.lockout.num_minutes()
    }

    /// Check if a username has too many recent failures
    pub async fn is_username_limited(&self, username: &str) -> bool {
        let mut attempts = self.username_attempts.write().await;
        let cutoff = Utc::now() - self.lockout;

        let entry = attempts.entry(username.to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= self.max_failed_logins
    }

    /// Record a failed login attempt for username
    pub async fn record_failed_attempt(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts.entry(username.to_lowercase()).or_default().push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts.remove(&username.to_lowercase());
    }

    /// Check if an address exceeded the per-IP request budget
    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let mut attempts = self.ip_attempts.write().await;
        let cutoff = Utc::now() - Duration::seconds(IP_WINDOW_SECONDS);

        let entry = attempts.entry(ip).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= MAX_IP_REQUESTS
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        let mut attempts = self.ip_attempts.write().await;
        attempts.entry(ip).or_default().push(Utc::now());
    }

    /// Drop expired entries; run periodically from a background task.
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let username_cutoff = now - self.lockout;
        let ip_cutoff = now - Duration::seconds(IP_WINDOW_SECONDS);

        {
            let mut attempts = self.username_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > username_cutoff);
                !times.is_empty()
            });
        }

        {
            let mut attempts = self.ip_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > ip_cutoff);
                !times.is_empty()
            });
        }
    }

    #[cfg(test)]
    async fn tracked_usernames(&self) -> usize {
        self.username_attempts.read().await.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_username_locks_after_configured_failures() {
        let limiter = LoginRateLimiter::new(3, 15);

        for _ in 0..2 {
            limiter.record_failed_attempt("jdoe").await;
            assert!(!limiter.is_username_limited("jdoe").await);
        }
        limiter.record_failed_attempt("jdoe").await;
        assert!(limiter.is_username_limited("jdoe").await);

        limiter.clear_username_attempts("jdoe").await;
        assert!(!limiter.is_username_limited("jdoe").await);
    }

    #[tokio::test]
    async fn test_username_is_case_insensitive() {
        let limiter = LoginRateLimiter::new(2, 15);
        limiter.record_failed_attempt("JDoe").await;
        limiter.record_failed_attempt("jdoe").await;
        assert!(limiter.is_username_limited("JDOE").await);
    }

    #[tokio::test]
    async fn test_ip_limit() {
        let limiter = LoginRateLimiter::default();
        let ip = IpAddr::from_str("10.0.0.7").unwrap();
        let other = IpAddr::from_str("10.0.0.8").unwrap();

        for _ in 0..MAX_IP_REQUESTS - 1 {
            limiter.record_ip_request(ip).await;
        }
        assert!(!limiter.is_ip_limited(ip).await);

        limiter.record_ip_request(ip).await;
        assert!(limiter.is_ip_limited(ip).await);
        assert!(!limiter.is_ip_limited(other).await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_empty_entries() {
        let limiter = LoginRateLimiter::default();
        // a lookup alone creates an empty entry
        assert!(!limiter.is_username_limited("ghost").await);
        assert_eq!(limiter.tracked_usernames().await, 1);

        limiter.cleanup().await;
        assert_eq!(limiter.tracked_usernames().await, 0);
    }

    #[test]
    fn test_from_config() {
        let config = AuthConfig {
            max_failed_logins: 4,
            lockout_minutes: 30,
            ..AuthConfig::default()
        };
        let limiter = LoginRateLimiter::from_config(&config);
        assert_eq!(limiter.lockout_minutes(), 30);
        assert_eq!(limiter.max_failed_logins, 4);
    }
}
