//! Command implementations behind the `outreach` binary.

pub mod bounces;
pub mod send;
pub mod startup;

use std::{io, path::PathBuf};

use outreach_common::{ConfigError, StoreError};
use outreach_delivery::{DispatchError, DnsError};
use thiserror::Error;

/// Failures that abort a command before or after the per-contact work.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dns(#[from] DnsError),

    /// The SMTP transport could not be built.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Bounce(#[from] outreach_bounce::BounceError),

    /// The log directory cannot be created.
    #[error("Cannot create {}: {source}", path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
