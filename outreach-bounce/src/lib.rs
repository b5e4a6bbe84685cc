//! Bounce processing.
//!
//! Scans a mailbox for "address not found" notices, extracts the failed
//! recipients and flags the matching contacts so they are retried (or
//! fixed) instead of being counted as delivered.

pub mod dsn;
pub mod error;
pub mod source;

use std::{collections::BTreeSet, path::Path};

use ahash::AHashSet;
use chrono::{DateTime, Utc};
use outreach_common::ContactSet;
use tracing::{debug, info};

pub use dsn::{extract_failed_addresses, is_address_not_found};
pub use error::BounceError;
pub use source::{BounceSource, MaildirSource, RawMessage};

/// Outcome of one bounce scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BounceReport {
    /// Messages inside the lookback window.
    pub scanned: usize,
    /// Messages that looked like "address not found" notices.
    pub candidates: usize,
    /// Every address reported as failed.
    pub failed: BTreeSet<String>,
    /// Contacts flagged as bounced, by email.
    pub marked: Vec<String>,
}

/// Collects failed addresses from all candidate notices since `since`.
pub async fn collect_failed(
    source: &dyn BounceSource,
    since: DateTime<Utc>,
    report: &mut BounceReport,
) -> Result<(), BounceError> {
    let messages = source.fetch_since(since).await?;
    report.scanned = messages.len();

    for message in &messages {
        if !is_address_not_found(&message.data) {
            continue;
        }
        report.candidates += 1;

        let failed = extract_failed_addresses(&message.data);
        debug!("{}: {} failed address(es)", message.id, failed.len());
        report.failed.extend(failed);
    }

    Ok(())
}

/// Flags every contact whose email is in `failed` (ignoring ASCII case).
///
/// Returns the emails of the contacts that were flagged.
pub fn mark_bounced(contacts: &mut ContactSet, failed: &BTreeSet<String>) -> Vec<String> {
    let failed: AHashSet<String> = failed
        .iter()
        .map(|address| address.trim().to_ascii_lowercase())
        .collect();

    let mut marked = Vec::new();
    for contact in contacts.iter_mut() {
        let Some(email) = contact.email() else {
            continue;
        };
        if failed.contains(&email.to_ascii_lowercase()) {
            let email = email.to_string();
            info!("Marking {email} as bounced");
            contact.mark_bounced();
            marked.push(email);
        }
    }

    marked
}

/// Loads the contact file, applies the bounces found since `since`, and
/// writes the file back when anything changed.
pub async fn process(
    source: &dyn BounceSource,
    contacts_file: &Path,
    since: DateTime<Utc>,
) -> Result<BounceReport, BounceError> {
    let mut contacts = ContactSet::load(contacts_file)?;
    let mut report = BounceReport::default();

    collect_failed(source, since, &mut report).await?;
    if report.scanned == 0 {
        info!("No messages found since {since}");
        return Ok(report);
    }
    if report.failed.is_empty() {
        info!(
            "Scanned {} message(s), {} candidate(s), no failed addresses",
            report.scanned, report.candidates
        );
        return Ok(report);
    }

    info!(
        "Detected bounced addresses: {}",
        report.failed.iter().cloned().collect::<Vec<_>>().join(", ")
    );

    report.marked = mark_bounced(&mut contacts, &report.failed);
    if !report.marked.is_empty() {
        contacts.save(contacts_file)?;
        info!(
            "{} updated with bounce info ({} contact(s))",
            contacts_file.display(),
            report.marked.len()
        );
    }

    Ok(report)
}
