//! Where bounce notices come from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::BounceError;

/// One raw RFC 5322 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Source-specific identifier, used in logs.
    pub id: String,
    pub data: Vec<u8>,
}

/// A mailbox that can list recent messages.
#[async_trait]
pub trait BounceSource: Send + Sync {
    /// Messages received at or after `since`.
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<RawMessage>, BounceError>;
}

/// Reads messages from a Maildir (or any directory of raw message files).
///
/// Files directly under the root are read, as well as those in the `new/`
/// and `cur/` subdirectories when they exist. Hidden files are ignored, and
/// a file's modification time stands in for its arrival time. Symlinks are
/// followed; a message that cannot be read is logged and skipped.
#[derive(Debug, Clone)]
pub struct MaildirSource {
    root: PathBuf,
}

impl MaildirSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn scan_dir(
        dir: &Path,
        since: DateTime<Utc>,
        out: &mut Vec<RawMessage>,
    ) -> Result<(), BounceError> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|err| BounceError::io(dir, err))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| BounceError::io(dir, err))?
        {
            let path = entry.path();
            let filename = entry.file_name();
            if filename.to_string_lossy().starts_with('.') {
                continue;
            }

            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!("Skipping {}: {err}", path.display());
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified: DateTime<Utc> = match metadata.modified() {
                Ok(modified) => modified.into(),
                Err(err) => {
                    warn!("Skipping {}: {err}", path.display());
                    continue;
                }
            };
            if modified < since {
                continue;
            }

            let data = match fs::read(&path).await {
                Ok(data) => data,
                Err(err) => {
                    warn!("Skipping {}: {err}", path.display());
                    continue;
                }
            };
            out.push(RawMessage {
                id: path.display().to_string(),
                data,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl BounceSource for MaildirSource {
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<RawMessage>, BounceError> {
        let mut messages = Vec::new();

        Self::scan_dir(&self.root, since, &mut messages).await?;
        for sub in ["new", "cur"] {
            let dir = self.root.join(sub);
            if fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
                Self::scan_dir(&dir, since, &mut messages).await?;
            }
        }

        messages.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(
            "Found {} message(s) in {} since {since}",
            messages.len(),
            self.root.display()
        );

        Ok(messages)
    }
}
