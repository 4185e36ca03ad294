//! Published-version lookups, cached in the update state.
//!
//! A failed lookup is never an error for the caller: it just means there is
//! no update information this run.

use crate::error::{CcaspError, Result};
use crate::store::StateStore;
use crate::update_state::{CheckResult, UpdateState};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default npm registry.
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// How long a cached check result is reused.
pub const DEFAULT_CHECK_TTL_MINUTES: i64 = 60;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

pub trait VersionSource {
    /// Latest published version, or [`CcaspError::NetworkUnavailable`].
    fn latest_published_version(&self) -> Result<String>;
}

// ---------------------------------------------------------------------------
// NpmRegistrySource
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NpmLatest {
    version: String,
}

pub struct NpmRegistrySource {
    client: Client,
    registry_url: String,
    package: String,
}

impl NpmRegistrySource {
    pub fn new(registry_url: impl Into<String>, package: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            registry_url: registry_url.into(),
            package: package.into(),
        }
    }

    fn latest_url(&self) -> String {
        format!(
            "{}/{}/latest",
            self.registry_url.trim_end_matches('/'),
            self.package
        )
    }
}

impl VersionSource for NpmRegistrySource {
    fn latest_published_version(&self) -> Result<String> {
        let unavailable = |e: reqwest::Error| CcaspError::NetworkUnavailable(e.to_string());
        let latest: NpmLatest = self
            .client
            .get(self.latest_url())
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .json()
            .map_err(unavailable)?;
        Ok(latest.version)
    }
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateInfo {
    pub current_version: String,
    pub latest_version: String,
    pub from_cache: bool,
}

/// `latest` is newer than `current`. Versions that are not valid semver
/// compare as "newer" when they merely differ.
pub fn is_newer(latest: &str, current: &str) -> bool {
    let strip = |v: &str| v.trim().trim_start_matches('v').to_string();
    match (
        semver::Version::parse(&strip(latest)),
        semver::Version::parse(&strip(current)),
    ) {
        (Ok(l), Ok(c)) => l > c,
        _ => strip(latest) != strip(current),
    }
}

pub struct UpdateChecker<'a> {
    source: &'a dyn VersionSource,
    current_version: String,
    ttl: chrono::Duration,
}

impl<'a> UpdateChecker<'a> {
    pub fn new(source: &'a dyn VersionSource, current_version: impl Into<String>) -> Self {
        Self {
            source,
            current_version: current_version.into(),
            ttl: chrono::Duration::minutes(DEFAULT_CHECK_TTL_MINUTES),
        }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Return the newer, non-dismissed version if there is one. Queries the
    /// source only when the cached result in `state` has expired.
    pub fn check(&self, state: &mut UpdateState, now: DateTime<Utc>) -> Option<UpdateInfo> {
        let (latest, from_cache) = if state.cache_is_fresh(now, self.ttl) {
            let cached = state.last_check_result.as_ref()?;
            (cached.latest_version.clone(), true)
        } else {
            match self.source.latest_published_version() {
                Ok(latest) => {
                    state.record_check(
                        CheckResult {
                            current_version: self.current_version.clone(),
                            latest_version: latest.clone(),
                            update_available: is_newer(&latest, &self.current_version),
                        },
                        now,
                    );
                    (latest, false)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "version check skipped");
                    return None;
                }
            }
        };

        if !is_newer(&latest, &self.current_version) || state.is_dismissed(&latest) {
            return None;
        }
        Some(UpdateInfo {
            current_version: self.current_version.clone(),
            latest_version: latest,
            from_cache,
        })
    }

    /// Load, check and save through `store`. A failed save only loses the
    /// cache.
    pub fn check_with_store(&self, store: &mut dyn StateStore) -> Option<UpdateInfo> {
        let mut state = store.load_update_state();
        let info = self.check(&mut state, Utc::now());
        if let Err(e) = store.save_update_state(&state) {
            tracing::warn!(error = %e, "update check cache not saved");
        }
        info
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Fixed {
        version: Option<&'static str>,
        calls: Cell<u32>,
    }

    impl Fixed {
        fn new(version: Option<&'static str>) -> Self {
            Self {
                version,
                calls: Cell::new(0),
            }
        }
    }

    impl VersionSource for Fixed {
        fn latest_published_version(&self) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.version
                .map(str::to_string)
                .ok_or_else(|| CcaspError::NetworkUnavailable("offline".into()))
        }
    }

    #[test]
    fn semver_comparison() {
        assert!(is_newer("1.10.0", "1.9.3"));
        assert!(!is_newer("1.9.3", "1.10.0"));
        assert!(!is_newer("v2.0.0", "2.0.0"));
        assert!(is_newer("nightly", "2.0.0"));
    }

    #[test]
    fn reports_newer_version_and_caches() {
        let source = Fixed::new(Some("2.1.0"));
        let checker = UpdateChecker::new(&source, "2.0.0");
        let mut state = UpdateState::default();
        let now = Utc::now();

        let info = checker.check(&mut state, now).unwrap();
        assert_eq!(info.latest_version, "2.1.0");
        assert!(!info.from_cache);

        let info = checker
            .check(&mut state, now + chrono::Duration::minutes(30))
            .unwrap();
        assert!(info.from_cache);
        assert_eq!(source.calls.get(), 1);

        checker.check(&mut state, now + chrono::Duration::minutes(61));
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn network_failure_is_no_info() {
        let source = Fixed::new(None);
        let mut state = UpdateState::default();
        assert!(UpdateChecker::new(&source, "2.0.0")
            .check(&mut state, Utc::now())
            .is_none());
        assert!(state.last_check_timestamp.is_none());
    }

    #[test]
    fn dismissed_version_is_silent() {
        let source = Fixed::new(Some("2.1.0"));
        let mut state = UpdateState::default();
        state.dismiss_version("2.1.0");
        assert!(UpdateChecker::new(&source, "2.0.0")
            .check(&mut state, Utc::now())
            .is_none());
        assert_eq!(state.latest_version_seen.as_deref(), Some("2.1.0"));
    }

    #[test]
    fn same_version_is_no_update() {
        let source = Fixed::new(Some("2.0.0"));
        let mut state = UpdateState::default();
        assert!(UpdateChecker::new(&source, "2.0.0")
            .check(&mut state, Utc::now())
            .is_none());
    }

    #[test]
    fn npm_source_reads_latest() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/claude-cli-advanced-starter-pack/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"claude-cli-advanced-starter-pack","version":"3.2.1"}"#)
            .create();

        let source = NpmRegistrySource::new(server.url(), "claude-cli-advanced-starter-pack");
        assert_eq!(source.latest_published_version().unwrap(), "3.2.1");
        mock.assert();
    }

    #[test]
    fn npm_source_http_error_is_unavailable() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/pkg/latest").with_status(503).create();
        let source = NpmRegistrySource::new(server.url(), "pkg");
        assert!(matches!(
            source.latest_published_version(),
            Err(CcaspError::NetworkUnavailable(_))
        ));
    }
}
