//! The `send` command: load contacts, run the send loop, save.

use outreach_common::{Config, ContactSet, Paths, RunPolicy};
use outreach_delivery::{
    AssetSelector, Clock, Dispatcher, DnsConfig, DnsMxChecker, MustacheRenderer, MxChecker,
    Renderer, RunSummary, SendLoop, SmtpDispatcher, SystemClock,
};
use tracing::info;

use crate::CommandError;

/// The collaborators a send run talks to.
pub struct Collaborators<'a> {
    pub mx: &'a dyn MxChecker,
    pub renderer: &'a dyn Renderer,
    pub dispatcher: &'a dyn Dispatcher,
    pub clock: &'a dyn Clock,
}

/// Runs against the real resolver, SMTP relay and wall clock.
pub async fn run(config: &Config) -> Result<RunSummary, CommandError> {
    let smtp = config.require_smtp()?;
    let dispatcher = SmtpDispatcher::from_settings(smtp)?;
    let mx = DnsMxChecker::new(&DnsConfig {
        timeout: config.dns_timeout,
    })?;

    info!(
        server = %smtp.server,
        port = smtp.port,
        tls = ?smtp.tls,
        "Using SMTP relay"
    );

    run_with(
        &config.policy,
        &config.paths,
        Collaborators {
            mx: &mx,
            renderer: &MustacheRenderer,
            dispatcher: &dispatcher,
            clock: &SystemClock,
        },
    )
    .await
}

/// Loads the contact file, processes it and writes it back.
///
/// Nothing is sent if the contact file cannot be loaded. The file is saved
/// even when every contact failed, so errors are recorded.
pub async fn run_with(
    policy: &RunPolicy,
    paths: &Paths,
    with: Collaborators<'_>,
) -> Result<RunSummary, CommandError> {
    let mut contacts = ContactSet::load(&paths.contacts_file)?;
    let assets = AssetSelector::new(paths);

    let summary = SendLoop::new(
        policy,
        &assets,
        with.mx,
        with.renderer,
        with.dispatcher,
        with.clock,
    )
    .run(&mut contacts)
    .await;

    contacts.save(&paths.contacts_file)?;
    info!(
        "Contacts saved to {} with send status and errors",
        paths.contacts_file.display()
    );

    Ok(summary)
}
