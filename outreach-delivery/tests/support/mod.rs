//! Hand-written doubles for the send loop collaborators.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashSet,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use outreach_common::{Contact, ContactSet, Domain, Paths, RunPolicy};
use outreach_delivery::{
    AssetSelector, Clock, DispatchError, Dispatcher, MxChecker, OutgoingEmail, RenderError,
    RenderedEmail, Renderer,
};

/// Domains listed in `without_mx` fail the check, everything else passes.
#[derive(Debug, Default)]
pub struct StaticMx {
    without_mx: HashSet<String>,
    lookups: AtomicUsize,
}

impl StaticMx {
    pub fn without(domains: &[&str]) -> Self {
        Self {
            without_mx: domains.iter().map(|d| d.to_ascii_lowercase()).collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MxChecker for StaticMx {
    async fn has_mail_exchange(&self, domain: &Domain) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        !self.without_mx.contains(&domain.canonical())
    }
}

/// Renders `Hello <email>` and fails for templates named `broken.*`.
#[derive(Debug, Default)]
pub struct StubRenderer;

impl Renderer for StubRenderer {
    fn render(&self, template: &Path, contact: &Contact) -> Result<RenderedEmail, RenderError> {
        let stem = template
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        if stem == "broken" {
            return Err(RenderError::Syntax {
                path: template.to_path_buf(),
                message: "unclosed section".to_string(),
            });
        }

        Ok(RenderedEmail {
            subject: format!("Template {stem}"),
            body: format!("Hello {}", contact.email().unwrap_or_default()),
        })
    }
}

/// Records every message and refuses the addresses in `reject`.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    reject: HashSet<String>,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingDispatcher {
    pub fn rejecting(addresses: &[&str]) -> Self {
        Self {
            reject: addresses.iter().map(ToString::to_string).collect(),
            sent: Mutex::default(),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|email| email.to).collect()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DispatchError> {
        if self.reject.contains(&email.to) {
            return Err(DispatchError::Rejected {
                permanent: true,
                detail: format!("550 5.1.1 <{}>: Recipient address rejected", email.to),
            });
        }

        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Virtual time: each `now()` moves forward a second, `sleep` jumps ahead.
#[derive(Debug)]
pub struct VirtualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap()),
            sleeps: Mutex::default(),
        }
    }
}

impl VirtualClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(1);
        *now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }
}

pub fn policy(batch_size: usize, pause_secs: u64, total_limit: usize) -> RunPolicy {
    RunPolicy {
        batch_size: NonZeroUsize::new(batch_size).unwrap(),
        pause_interval: Duration::from_secs(pause_secs),
        total_limit: NonZeroUsize::new(total_limit).unwrap(),
    }
}

/// Selector over `t/` and `a/` where only `existing` files are present.
pub fn selector(existing: &[&str]) -> AssetSelector {
    let existing: HashSet<PathBuf> = existing.iter().map(PathBuf::from).collect();

    AssetSelector::new(&Paths {
        templates_dir: PathBuf::from("t"),
        template_ext: "mustache".to_string(),
        attachments_dir: PathBuf::from("a"),
        ..Paths::default()
    })
    .with_exists(move |path| existing.contains(path))
}

pub fn contacts(csv: &str) -> ContactSet {
    ContactSet::from_reader(csv.as_bytes()).unwrap()
}

/// `count` deliverable contacts `c0@ok.com`, `c1@ok.com`...
pub fn numbered(count: usize) -> ContactSet {
    let mut csv = String::from("email\n");
    for i in 0..count {
        csv.push_str(&format!("c{i}@ok.com\n"));
    }
    contacts(&csv)
}
