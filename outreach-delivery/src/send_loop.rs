//! The paced send loop.
//!
//! Contacts are processed strictly in file order, one at a time:
//!
//! 1. Skip contacts already marked `sent=yes`
//! 2. Stop the whole run once the nightly limit is reached
//! 3. Pre-check the address (present, domain has MX)
//! 4. Pick template and attachment, render, dispatch
//! 5. Record the outcome on the contact
//! 6. Pause after every `batch_size` attempts, unless the limit was just hit
//!
//! Per-contact failures never abort the run. They are logged and written to
//! the contact's `error` field, and the contact stays eligible for the next
//! run.

use std::path::PathBuf;

use outreach_common::{Contact, ContactSet, Domain, RunPolicy};
use tracing::{error, info, warn};

use crate::{
    clock::Clock,
    dispatch::{Dispatcher, OutgoingEmail},
    dns::MxChecker,
    error::{ContactError, DeliverabilityError},
    render::Renderer,
    resolve::AssetSelector,
};

/// What a successful dispatch used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentInfo {
    pub template: PathBuf,
    pub attachment: PathBuf,
    pub subject: String,
}

/// Totals for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Contacts marked sent during this run.
    pub sent: usize,
    /// Render or dispatch failures.
    pub failed: usize,
    /// Contacts rejected before any send was attempted.
    pub precheck_failed: usize,
    /// Contacts already sent in an earlier run.
    pub skipped: usize,
    pub pauses: usize,
    /// Whether the nightly limit cut the run short.
    pub halted: bool,
}

impl RunSummary {
    /// Sends attempted, successful or not.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.sent + self.failed
    }
}

/// Mutable state owned by a single run.
#[derive(Debug, Default)]
struct Counters {
    sent: usize,
    batch: usize,
}

/// Everything a run needs, borrowed for its duration.
pub struct SendLoop<'a> {
    policy: &'a RunPolicy,
    assets: &'a AssetSelector,
    mx: &'a dyn MxChecker,
    renderer: &'a dyn Renderer,
    dispatcher: &'a dyn Dispatcher,
    clock: &'a dyn Clock,
}

impl<'a> SendLoop<'a> {
    #[must_use]
    pub const fn new(
        policy: &'a RunPolicy,
        assets: &'a AssetSelector,
        mx: &'a dyn MxChecker,
        renderer: &'a dyn Renderer,
        dispatcher: &'a dyn Dispatcher,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            policy,
            assets,
            mx,
            renderer,
            dispatcher,
            clock,
        }
    }

    /// Processes every contact in order, mutating status fields in place.
    ///
    /// The caller is responsible for saving the set afterwards.
    pub async fn run(&self, contacts: &mut ContactSet) -> RunSummary {
        let batch_size = self.policy.batch_size.get();
        let total_limit = self.policy.total_limit.get();

        let mut counters = Counters::default();
        let mut summary = RunSummary::default();

        info!(
            contacts = contacts.len(),
            batch_size,
            total_limit,
            pause_secs = self.policy.pause_interval.as_secs(),
            "=== Starting send run ==="
        );

        for contact in contacts.iter_mut() {
            if contact.is_sent() {
                summary.skipped += 1;
                continue;
            }

            if counters.sent >= total_limit {
                info!("Reached nightly limit ({total_limit}), stopping.");
                summary.halted = true;
                break;
            }

            let recipient = match self.precheck(contact).await {
                Ok(recipient) => recipient,
                Err(err) => {
                    let label = contact.email().unwrap_or("<no email>").to_string();
                    warn!("{label} skipped: {err}");
                    contact.mark_failed(err.to_string());
                    summary.precheck_failed += 1;
                    continue;
                }
            };

            match self.attempt(contact, &recipient).await {
                Ok(sent) => {
                    contact.mark_sent(self.clock.now());
                    counters.sent += 1;
                    counters.batch += 1;
                    summary.sent += 1;

                    info!(
                        template = %sent.template.display(),
                        subject = %sent.subject,
                        "Sent to {recipient} (batch {}/{batch_size}, total {}/{total_limit})",
                        counters.batch,
                        counters.sent
                    );
                }
                Err(err) => {
                    debug_assert!(err.is_attempt());
                    contact.mark_failed(err.to_string());
                    counters.batch += 1;
                    summary.failed += 1;

                    error!("Failed to send to {recipient}: {err}");
                }
            }

            if counters.batch >= batch_size && counters.sent < total_limit {
                let pause = self.policy.pause_interval;
                info!("Batch of {batch_size} done, sleeping {}s", pause.as_secs());
                self.clock.sleep(pause).await;
                counters.batch = 0;
                summary.pauses += 1;
            }
        }

        info!(
            sent = summary.sent,
            failed = summary.failed,
            precheck_failed = summary.precheck_failed,
            skipped = summary.skipped,
            pauses = summary.pauses,
            halted = summary.halted,
            "=== Send run complete ==="
        );

        summary
    }

    /// Returns the trimmed recipient address when the contact is worth
    /// attempting.
    async fn precheck(&self, contact: &Contact) -> Result<String, DeliverabilityError> {
        let recipient = contact.email().ok_or(DeliverabilityError::MissingEmail)?;
        let domain = Domain::of_address(recipient);

        if self.mx.has_mail_exchange(&domain).await {
            Ok(recipient.to_string())
        } else {
            Err(DeliverabilityError::NoMxRecord(domain))
        }
    }

    async fn attempt(&self, contact: &Contact, recipient: &str) -> Result<SentInfo, ContactError> {
        let assets = self.assets.select(contact.template_key());
        let rendered = self.renderer.render(&assets.template, contact)?;

        let email = OutgoingEmail {
            to: recipient.to_string(),
            subject: rendered.subject,
            body: rendered.body,
            attachments: vec![assets.attachment.clone()],
        };
        self.dispatcher.send(&email).await?;

        Ok(SentInfo {
            template: assets.template,
            attachment: assets.attachment,
            subject: email.subject,
        })
    }
}

impl std::fmt::Debug for SendLoop<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendLoop")
            .field("policy", self.policy)
            .field("assets", self.assets)
            .finish_non_exhaustive()
    }
}
