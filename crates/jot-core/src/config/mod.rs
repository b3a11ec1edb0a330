//! Sync engine configuration.
//!
//! Defaults match the behaviour clients have always shipped with; every knob
//! can be overridden from the environment for testing against slow or flaky
//! servers.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::remote::ApiSession;
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_COOLDOWN_SECS: u64 = 30;
const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_INTERVAL_SECS: u64 = 15 * 60;
const DEFAULT_BACKOFF_BASE_SECS: u64 = 30;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 30 * 60;

/// Tunables for the reachability gate and the sync worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// How long to stay away from a server that just failed
    pub unreachable_cooldown: Duration,
    /// Entries processed per worker pass
    pub batch_size: usize,
    /// Attempts after which a queue entry is dropped
    pub max_retries: u32,
    /// Interval of the periodic background pass
    pub periodic_interval: Duration,
    /// First delay after a pass that needs a retry
    pub backoff_base: Duration,
    /// Upper bound on the retry delay
    pub backoff_max: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            unreachable_cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            periodic_interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            backoff_base: Duration::from_secs(DEFAULT_BACKOFF_BASE_SECS),
            backoff_max: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
        }
    }
}

impl SyncSettings {
    /// Defaults overridden by `JOT_SYNC_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `JOT_SYNC_*` keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(secs) = parse_setting::<u64>(&lookup, "JOT_SYNC_COOLDOWN_SECS") {
            settings.unreachable_cooldown = Duration::from_secs(secs);
        }
        if let Some(size) = parse_setting::<usize>(&lookup, "JOT_SYNC_BATCH_SIZE") {
            if size > 0 {
                settings.batch_size = size;
            }
        }
        if let Some(retries) = parse_setting::<u32>(&lookup, "JOT_SYNC_MAX_RETRIES") {
            settings.max_retries = retries;
        }
        if let Some(secs) = parse_setting::<u64>(&lookup, "JOT_SYNC_INTERVAL_SECS") {
            if secs > 0 {
                settings.periodic_interval = Duration::from_secs(secs);
            }
        }

        settings
    }

    /// Delay before the next pass after `consecutive_failures` retry results
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        const MAX_EXPONENT: u32 = 16;

        let factor = 2_u32.pow(consecutive_failures.min(MAX_EXPONENT));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_max)
    }
}

fn parse_setting<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = normalize_text_option(lookup(key))?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {key}: {raw:?}");
            None
        }
    }
}

/// Remote endpoint from `JOT_API_URL` / `JOT_API_TOKEN`.
///
/// Returns `Ok(None)` when either is unset, which callers treat as local-only
/// mode.
pub fn remote_session_from_env() -> Result<Option<ApiSession>> {
    remote_session_from_lookup(|key| std::env::var(key).ok())
}

pub fn remote_session_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<ApiSession>> {
    let url = normalize_text_option(lookup("JOT_API_URL"));
    let token = normalize_text_option(lookup("JOT_API_TOKEN"));

    match (url, token) {
        (Some(url), Some(token)) => {
            if is_http_url(&url) {
                Ok(Some(ApiSession::new(url, token)))
            } else {
                Err(Error::InvalidInput(
                    "JOT_API_URL must include http:// or https://".to_string(),
                ))
            }
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = SyncSettings::default();
        assert_eq!(settings.unreachable_cooldown, Duration::from_secs(30));
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.max_retries, 5);
    }

    #[test]
    fn lookup_overrides_and_ignores_garbage() {
        let settings = SyncSettings::from_lookup(lookup(&[
            ("JOT_SYNC_COOLDOWN_SECS", "5"),
            ("JOT_SYNC_BATCH_SIZE", "many"),
            ("JOT_SYNC_MAX_RETRIES", " 2 "),
            ("JOT_SYNC_INTERVAL_SECS", "0"),
        ]));
        assert_eq!(settings.unreachable_cooldown, Duration::from_secs(5));
        assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(settings.max_retries, 2);
        assert_eq!(
            settings.periodic_interval,
            Duration::from_secs(DEFAULT_INTERVAL_SECS)
        );
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let settings = SyncSettings::default();
        assert_eq!(settings.backoff_delay(0), Duration::from_secs(30));
        assert_eq!(settings.backoff_delay(1), Duration::from_secs(60));
        assert_eq!(settings.backoff_delay(2), Duration::from_secs(120));
        assert_eq!(settings.backoff_delay(40), settings.backoff_max);
    }

    #[test]
    fn remote_session_requires_both_values() {
        assert!(matches!(
            remote_session_from_lookup(lookup(&[("JOT_API_URL", "https://x.test")])),
            Ok(None)
        ));

        let session = remote_session_from_lookup(lookup(&[
            ("JOT_API_URL", "https://notes.example.com/v1/"),
            ("JOT_API_TOKEN", "tok"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(session.base_url, "https://notes.example.com/v1");

        assert!(matches!(
            remote_session_from_lookup(lookup(&[
                ("JOT_API_URL", "notes.example.com"),
                ("JOT_API_TOKEN", "tok"),
            ])),
            Err(Error::InvalidInput(_))
        ));
    }
}
