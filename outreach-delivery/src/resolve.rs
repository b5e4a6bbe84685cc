//! Per-domain asset lookup.
//!
//! Both templates and attachments are stored as `<key><suffix>` inside a
//! directory, where the key is the contact's `domain` column. A missing
//! per-key file falls back to the `default` one.

use std::path::{Path, PathBuf};

use outreach_common::{Paths, contact::DEFAULT_KEY};

/// Suffix of per-key attachment files.
pub const ATTACHMENT_SUFFIX: &str = "_resume.pdf";

/// Picks `<dir>/<key><suffix>` when it exists, else `<dir>/<default><suffix>`.
///
/// The fallback path is returned even when it does not exist either; the
/// caller reports that when it tries to read it.
pub fn resolve(
    key: &str,
    dir: &Path,
    suffix: &str,
    default: &str,
    exists: impl Fn(&Path) -> bool,
) -> PathBuf {
    let candidate = dir.join(format!("{key}{suffix}"));
    if exists(&candidate) {
        candidate
    } else {
        dir.join(format!("{default}{suffix}"))
    }
}

/// The files chosen for one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assets {
    pub template: PathBuf,
    pub attachment: PathBuf,
}

type ExistsFn = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Resolves templates and attachments for a template key.
pub struct AssetSelector {
    templates_dir: PathBuf,
    template_suffix: String,
    attachments_dir: PathBuf,
    exists: ExistsFn,
}

impl AssetSelector {
    #[must_use]
    pub fn new(paths: &Paths) -> Self {
        Self {
            templates_dir: paths.templates_dir.clone(),
            template_suffix: format!(".{}", paths.template_ext.trim_start_matches('.')),
            attachments_dir: paths.attachments_dir.clone(),
            exists: Box::new(Path::is_file),
        }
    }

    /// Replaces the filesystem probe.
    #[must_use]
    pub fn with_exists(mut self, exists: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.exists = Box::new(exists);
        self
    }

    #[must_use]
    pub fn template(&self, key: &str) -> PathBuf {
        resolve(
            key,
            &self.templates_dir,
            &self.template_suffix,
            DEFAULT_KEY,
            &self.exists,
        )
    }

    #[must_use]
    pub fn attachment(&self, key: &str) -> PathBuf {
        resolve(
            key,
            &self.attachments_dir,
            ATTACHMENT_SUFFIX,
            DEFAULT_KEY,
            &self.exists,
        )
    }

    #[must_use]
    pub fn select(&self, key: &str) -> Assets {
        Assets {
            template: self.template(key),
            attachment: self.attachment(key),
        }
    }
}

impl std::fmt::Debug for AssetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetSelector")
            .field("templates_dir", &self.templates_dir)
            .field("template_suffix", &self.template_suffix)
            .field("attachments_dir", &self.attachments_dir)
            .finish_non_exhaustive()
    }
}
