//! Shared pieces of the outreach mailer: the contact store, configuration,
//! the [`Domain`] newtype and logging setup.

pub mod config;
pub mod contact;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::{BounceSettings, Config, Paths, RunPolicy, SmtpSettings, TlsMode};
pub use contact::{Contact, ContactSet};
pub use domain::Domain;
pub use error::{ConfigError, StoreError};
pub use tracing;
