//! MX pre-checks.
//!
//! A contact is only worth attempting if its domain publishes at least one
//! usable MX record. Every resolver failure (NXDOMAIN, no answer, timeout,
//! malformed name) counts as "no MX": the check must never abort a run.
//!
//! Results are cached per checker instance, keyed on the lower-cased domain,
//! so a run never asks twice about the same domain.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use hickory_resolver::{
    TokioResolver,
    config::{ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
};
use outreach_common::Domain;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors constructing the resolver.
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("Failed to initialise DNS resolver: {0}")]
    Init(#[from] hickory_resolver::ResolveError),
}

/// Answers "can this domain receive mail?".
#[async_trait]
pub trait MxChecker: Send + Sync {
    async fn has_mail_exchange(&self, domain: &Domain) -> bool;
}

/// Resolver settings.
#[derive(Debug, Clone)]
pub struct DnsConfig {
    /// Per-query timeout (default: 5 seconds)
    pub timeout: Duration,
}

const fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

/// [`MxChecker`] backed by hickory's tokio resolver.
#[derive(Debug)]
pub struct DnsMxChecker {
    resolver: TokioResolver,
    cache: DashMap<String, bool>,
}

impl DnsMxChecker {
    /// Uses the system resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn new(config: &DnsConfig) -> Result<Self, DnsError> {
        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
            .with_options(Self::options(config))
            .build();

        Ok(Self {
            resolver,
            cache: DashMap::new(),
        })
    }

    /// Uses an explicit set of name servers.
    #[must_use]
    pub fn with_resolver_config(resolver_config: ResolverConfig, config: &DnsConfig) -> Self {
        let resolver =
            TokioResolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(Self::options(config))
                .build();

        Self {
            resolver,
            cache: DashMap::new(),
        }
    }

    fn options(config: &DnsConfig) -> ResolverOpts {
        let mut opts = ResolverOpts::default();
        opts.timeout = config.timeout;
        // One answer is all the pre-check needs.
        opts.attempts = 1;
        opts
    }

    /// Number of distinct domains looked up so far.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    async fn lookup(&self, domain: &str) -> bool {
        // Fully qualified so search domains from resolv.conf never apply.
        let fqdn = if domain.ends_with('.') {
            domain.to_string()
        } else {
            format!("{domain}.")
        };

        match self.resolver.mx_lookup(fqdn.as_str()).await {
            Ok(lookup) => {
                // A lone "0 ." record (RFC 7505 null MX) means the domain
                // explicitly accepts no mail.
                let usable = lookup.iter().any(|mx| !mx.exchange().is_root());
                debug!(
                    "MX lookup for {domain}: {} record(s), usable: {usable}",
                    lookup.iter().count()
                );
                usable
            }
            Err(err) if err.is_no_records_found() => {
                debug!("No MX records for {domain}");
                false
            }
            Err(err) => {
                warn!("MX lookup failed for {domain}: {err}");
                false
            }
        }
    }
}

#[async_trait]
impl MxChecker for DnsMxChecker {
    async fn has_mail_exchange(&self, domain: &Domain) -> bool {
        let key = domain.canonical();
        if key.is_empty() {
            return false;
        }

        if let Some(cached) = self.cache.get(&key) {
            debug!("MX cache hit for {key}: {}", *cached);
            return *cached;
        }

        let found = self.lookup(&key).await;
        self.cache.insert(key, found);
        found
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        assert_eq!(DnsConfig::default().timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_empty_domain_has_no_mx() {
        let checker = DnsMxChecker::with_resolver_config(
            ResolverConfig::default(),
            &DnsConfig::default(),
        );

        assert!(!checker.has_mail_exchange(&Domain::new("")).await);
        assert_eq!(checker.cached(), 0);
    }

    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn test_mx_lookup_gmail() {
        let checker = DnsMxChecker::new(&DnsConfig::default()).unwrap();

        assert!(checker.has_mail_exchange(&Domain::new("gmail.com")).await);
        assert!(checker.has_mail_exchange(&Domain::new("GMAIL.com")).await);
        assert_eq!(checker.cached(), 1);
    }

    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn test_nonexistent_domain() {
        let checker = DnsMxChecker::new(&DnsConfig::default()).unwrap();

        let domain = Domain::new("this-domain-definitely-does-not-exist-12345.invalid");
        assert!(!checker.has_mail_exchange(&domain).await);
    }
}
