use std::{io, path::PathBuf};

use outreach_common::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BounceError {
    /// The bounce mailbox could not be listed or read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BounceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
