//! Domain newtype
//!
//! Wraps domain strings so a recipient address is never passed where a
//! mail domain is expected.

use std::{
    fmt::{self, Display},
    ops::Deref,
    sync::Arc,
};

/// A mail domain, as used for MX lookups.
///
/// # Examples
///
/// ```
/// use outreach_common::Domain;
///
/// let domain = Domain::of_address("jane@example.com");
/// assert_eq!(domain.as_str(), "example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Domain(Arc<str>);

impl Domain {
    #[must_use]
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    /// Takes everything after the last `@` of an address.
    ///
    /// An address without `@` is treated as a bare domain, so it still goes
    /// through (and most likely fails) the MX lookup instead of being dropped.
    #[must_use]
    pub fn of_address(address: &str) -> Self {
        let address = address.trim();
        let domain = address
            .rsplit_once('@')
            .map_or(address, |(_, domain)| domain);

        Self::new(domain)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased form, used as a cache key.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for Domain {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Domain {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for Domain {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}
