//! The `bounces` command.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use outreach_bounce::{BounceReport, MaildirSource};
use outreach_common::Config;
use tracing::info;

use crate::CommandError;

/// Command-line overrides for the bounce settings.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub maildir: Option<PathBuf>,
    pub lookback_days: Option<u32>,
}

pub async fn run(config: &Config, overrides: Overrides) -> Result<BounceReport, CommandError> {
    let maildir = overrides
        .maildir
        .unwrap_or_else(|| config.bounce.maildir.clone());
    let lookback = overrides
        .lookback_days
        .map_or(config.bounce.lookback, |days| {
            chrono::Duration::days(i64::from(days))
        });
    let since = Utc::now()
        .checked_sub_signed(lookback)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    info!(
        "Searching {} for bounce notices since {}",
        maildir.display(),
        since.format("%Y/%m/%d %H:%M")
    );

    let source = MaildirSource::new(maildir);
    let report = outreach_bounce::process(&source, &config.paths.contacts_file, since).await?;

    Ok(report)
}
