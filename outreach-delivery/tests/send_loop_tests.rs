//! Send loop behaviour against in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::{path::PathBuf, time::Duration};

use outreach_common::ContactSet;
use outreach_delivery::{RunSummary, SendLoop};
use pretty_assertions::assert_eq;
use support::{
    RecordingDispatcher, StaticMx, StubRenderer, VirtualClock, contacts, numbered, policy,
    selector,
};

struct Harness {
    mx: StaticMx,
    dispatcher: RecordingDispatcher,
    clock: VirtualClock,
}

impl Harness {
    fn new(mx: StaticMx, dispatcher: RecordingDispatcher) -> Self {
        Self {
            mx,
            dispatcher,
            clock: VirtualClock::default(),
        }
    }

    async fn run(
        &self,
        batch_size: usize,
        pause_secs: u64,
        total_limit: usize,
        set: &mut ContactSet,
    ) -> RunSummary {
        self.run_with(batch_size, pause_secs, total_limit, &[], set)
            .await
    }

    async fn run_with(
        &self,
        batch_size: usize,
        pause_secs: u64,
        total_limit: usize,
        existing: &[&str],
        set: &mut ContactSet,
    ) -> RunSummary {
        let policy = policy(batch_size, pause_secs, total_limit);
        let assets = selector(existing);
        let renderer = StubRenderer;

        SendLoop::new(
            &policy,
            &assets,
            &self.mx,
            &renderer,
            &self.dispatcher,
            &self.clock,
        )
        .run(set)
        .await
    }
}

fn default_harness() -> Harness {
    Harness::new(StaticMx::default(), RecordingDispatcher::default())
}

#[tokio::test]
async fn test_no_mx_and_already_sent() {
    let harness = Harness::new(StaticMx::without(&["x.com"]), RecordingDispatcher::default());
    let mut set = contacts("email,sent\na@x.com,\nb@y.com,yes\n");
    let before = set.contacts()[1].clone();

    let summary = harness.run(5, 1800, 5, &mut set).await;

    let a = &set.contacts()[0];
    assert!(!a.is_sent());
    assert!(a.error().contains("no MX record for domain 'x.com'"));
    assert_eq!(a.sent_at(), "");
    assert_eq!(set.contacts()[1], before);

    assert!(harness.dispatcher.sent().is_empty());
    assert!(harness.clock.sleeps().is_empty());
    assert_eq!(
        summary,
        RunSummary {
            precheck_failed: 1,
            skipped: 1,
            ..RunSummary::default()
        }
    );
}

#[tokio::test]
async fn test_two_sends_with_batch_of_one() {
    let harness = default_harness();
    let mut set = numbered(2);

    let summary = harness.run(1, 0, 2, &mut set).await;

    let [first, second] = set.contacts() else {
        panic!("expected two contacts");
    };
    assert!(first.is_sent() && second.is_sent());
    assert!(!first.sent_at().is_empty());
    assert!(first.sent_at() < second.sent_at());

    // The second send reaches the limit, so only the first one pauses.
    assert_eq!(harness.clock.sleeps(), vec![Duration::ZERO]);
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.pauses, 1);
    assert!(!summary.halted);
}

#[tokio::test]
async fn test_sent_at_format() {
    let harness = default_harness();
    let mut set = numbered(1);

    harness.run(5, 0, 5, &mut set).await;

    assert_eq!(set.contacts()[0].sent_at(), "2024-03-01T22:00:01.000Z");
}

#[tokio::test]
async fn test_nightly_limit_halts_run() {
    let harness = default_harness();
    let mut set = numbered(7);

    let summary = harness.run(5, 60, 3, &mut set).await;

    assert_eq!(
        harness.dispatcher.recipients(),
        vec!["c0@ok.com", "c1@ok.com", "c2@ok.com"]
    );
    assert!(summary.halted);
    assert_eq!(summary.sent, 3);

    for contact in &set.contacts()[3..] {
        assert!(!contact.is_sent());
        assert_eq!(contact.error(), "");
    }
    // Halting happens before the MX check of the fourth contact.
    assert_eq!(harness.mx.lookups(), 3);
}

#[tokio::test]
async fn test_pause_count_includes_failures() {
    let harness = Harness::new(
        StaticMx::default(),
        RecordingDispatcher::rejecting(&["c3@ok.com"]),
    );
    let mut set = numbered(7);

    let summary = harness.run(2, 30, 100, &mut set).await;

    assert_eq!(summary.attempts(), 7);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.pauses, 3);
    assert_eq!(harness.clock.sleeps(), vec![Duration::from_secs(30); 3]);
}

#[tokio::test]
async fn test_no_pause_when_limit_reached_on_batch_boundary() {
    let harness = default_harness();
    let mut set = numbered(6);

    let summary = harness.run(2, 30, 4, &mut set).await;

    assert_eq!(summary.sent, 4);
    assert_eq!(summary.pauses, 1);
    assert!(summary.halted);
}

#[tokio::test]
async fn test_no_mx_does_not_consume_quota() {
    let harness = Harness::new(StaticMx::without(&["dead.org"]), RecordingDispatcher::default());
    let mut set = contacts("email\na@dead.org\nb@ok.com\nc@ok.com\n");

    let summary = harness.run(1, 0, 2, &mut set).await;

    assert_eq!(harness.dispatcher.recipients(), vec!["b@ok.com", "c@ok.com"]);
    assert!(!set.contacts()[0].is_sent());
    assert_eq!(summary.precheck_failed, 1);
    assert_eq!(summary.sent, 2);
    // The skipped contact is no attempt, so it never triggers a pause.
    assert_eq!(summary.pauses, 1);
}

#[tokio::test]
async fn test_rejection_is_recorded_and_run_continues() {
    let harness = Harness::new(
        StaticMx::default(),
        RecordingDispatcher::rejecting(&["a@ok.com"]),
    );
    let mut set = contacts("email,sent,sent_at,error\na@ok.com,no,,\nb@ok.com,no,,old failure\n");

    let summary = harness.run(5, 0, 5, &mut set).await;

    let [a, b] = set.contacts() else {
        panic!("expected two contacts");
    };
    assert!(!a.is_sent());
    assert!(a.error().contains("550 5.1.1 <a@ok.com>"));
    assert!(b.is_sent());
    assert_eq!(b.error(), "");
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn test_render_failure_counts_as_attempt() {
    let harness = default_harness();
    let mut set = contacts("email,domain\na@ok.com,broken\nb@ok.com,\n");

    let summary = harness
        .run_with(1, 10, 5, &["t/broken.mustache"], &mut set)
        .await;

    let a = &set.contacts()[0];
    assert!(!a.is_sent());
    assert!(a.error().contains("unclosed section"));
    assert_eq!(harness.dispatcher.recipients(), vec!["b@ok.com"]);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.pauses, 2);
}

#[tokio::test]
async fn test_missing_email_is_precheck_failure() {
    let harness = default_harness();
    let mut set = contacts("email,first_name\n  ,Nobody\nb@ok.com,Bee\n");

    let summary = harness.run(5, 0, 5, &mut set).await;

    assert_eq!(set.contacts()[0].error(), "missing email address");
    assert_eq!(summary.precheck_failed, 1);
    assert_eq!(harness.mx.lookups(), 1);
}

#[tokio::test]
async fn test_email_is_trimmed() {
    let harness = default_harness();
    let mut set = contacts("email\n  spaced@ok.com \n");

    harness.run(5, 0, 5, &mut set).await;

    assert_eq!(harness.dispatcher.recipients(), vec!["spaced@ok.com"]);
}

#[tokio::test]
async fn test_per_domain_assets() {
    let harness = default_harness();
    let mut set = contacts("email,domain\na@ok.com,x.com\nb@ok.com,y.com\n");

    harness
        .run_with(5, 0, 5, &["t/x.com.mustache", "a/y.com_resume.pdf"], &mut set)
        .await;

    let sent = harness.dispatcher.sent();
    assert_eq!(sent[0].subject, "Template x.com");
    assert_eq!(sent[0].attachments, vec![PathBuf::from("a/default_resume.pdf")]);
    assert_eq!(sent[1].subject, "Template default");
    assert_eq!(sent[1].attachments, vec![PathBuf::from("a/y.com_resume.pdf")]);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let harness = default_harness();
    let mut set = numbered(3);
    harness.run(5, 0, 5, &mut set).await;

    let before = set.write_to(Vec::new()).unwrap();
    let summary = harness.run(5, 0, 5, &mut set).await;
    let after = set.write_to(Vec::new()).unwrap();

    assert_eq!(before, after);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.attempts(), 0);
    assert_eq!(harness.dispatcher.sent().len(), 3);
}
