//! Typed errors for per-contact processing.
//!
//! None of these abort a run. The send loop records them in the contact's
//! `error` field and moves on; only a [`DeliverabilityError`] keeps the
//! contact from counting as a send attempt.

use std::{io, path::PathBuf};

use outreach_common::Domain;
use thiserror::Error;

/// Why a contact was not worth attempting.
#[derive(Debug, Error)]
pub enum DeliverabilityError {
    /// MX lookup failed or returned nothing usable.
    #[error("no MX record for domain '{0}'")]
    NoMxRecord(Domain),

    /// The row has no recipient address.
    #[error("missing email address")]
    MissingEmail,
}

/// Template loading and rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Neither the per-domain nor the default template exists.
    #[error("template not found: {}", .0.display())]
    MissingTemplate(PathBuf),

    #[error("failed to read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid template {}: {message}", path.display())]
    Syntax { path: PathBuf, message: String },
}

/// Failures handing a message to the SMTP relay.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The relay answered with an error reply (recipient refused, policy,
    /// authentication...).
    #[error("rejected by server: {detail}")]
    Rejected { permanent: bool, detail: String },

    /// Connection, TLS or timeout trouble.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    /// The message could not be assembled.
    #[error("failed to build message: {0}")]
    Message(String),

    #[error("failed to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The transport could not be set up from the given settings.
    #[error("SMTP configuration error: {0}")]
    Config(String),
}

impl DispatchError {
    /// `true` when resending the same message later is pointless.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::Rejected { permanent, .. } => *permanent,
            Self::Address { .. } => true,
            Self::Transport(_) | Self::Message(_) | Self::Attachment { .. } | Self::Config(_) => {
                false
            }
        }
    }
}

/// Map lettre's SMTP errors onto the dispatch taxonomy.
///
/// - **Server replies** (4xx/5xx) → `Rejected`, keeping the reply text
/// - **Everything else** (network, TLS, timeouts) → `Transport`
impl From<lettre::transport::smtp::Error> for DispatchError {
    fn from(error: lettre::transport::smtp::Error) -> Self {
        if error.is_permanent() || error.is_transient() {
            Self::Rejected {
                permanent: error.is_permanent(),
                detail: error.to_string(),
            }
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Any failure that stops a single contact from being sent.
#[derive(Debug, Error)]
pub enum ContactError {
    #[error(transparent)]
    Deliverability(#[from] DeliverabilityError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ContactError {
    /// Whether the failure happened after a send was attempted, which is what
    /// the batch pause counts.
    #[must_use]
    pub const fn is_attempt(&self) -> bool {
        !matches!(self, Self::Deliverability(_))
    }
}
