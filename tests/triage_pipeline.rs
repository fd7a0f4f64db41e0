//! End-to-end pipeline tests against an in-memory mailbox and customizer.
//!
//! The fake mailbox persists labels between runs the way a real one does,
//! so multi-run properties (idempotence, at-most-once contact) can be
//! checked directly.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use proptest::prelude::*;
use tokio::time::timeout;

use recruit_triage::config::{ContactDetails, TriageConfig};
use recruit_triage::customizer::{CustomizedDocument, DocumentCustomizer};
use recruit_triage::error::{ChannelError, PipelineError};
use recruit_triage::pipeline::types::{
    MailMessage, MailThread, Mailbox, OutgoingReply, RoleTag, ThreadOutcome,
};
use recruit_triage::pipeline::TriagePipeline;
use recruit_triage::store::{MemoryStore, RecipientLedger};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ── Fakes ───────────────────────────────────────────────────────────

#[derive(Default)]
struct MailboxState {
    threads: Vec<MailThread>,
    sent: Vec<OutgoingReply>,
    drafts: Vec<OutgoingReply>,
    fail_search: bool,
    fail_labels: bool,
    fail_send_to: HashSet<String>,
}

#[derive(Default)]
struct FakeMailbox {
    state: Mutex<MailboxState>,
}

impl FakeMailbox {
    fn with_threads(threads: Vec<MailThread>) -> Self {
        let mailbox = Self::default();
        mailbox.state.lock().unwrap().threads = threads;
        mailbox
    }

    fn sent(&self) -> Vec<OutgoingReply> {
        self.state.lock().unwrap().sent.clone()
    }

    fn drafts(&self) -> Vec<OutgoingReply> {
        self.state.lock().unwrap().drafts.clone()
    }

    fn labels(&self, thread_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .threads
            .iter()
            .find(|t| t.id == thread_id)
            .map(|t| t.labels.clone())
            .unwrap_or_default()
    }

    fn push_thread(&self, thread: MailThread) {
        self.state.lock().unwrap().threads.push(thread);
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, _newer_than_days: u32) -> Result<Vec<MailThread>, ChannelError> {
        let state = self.state.lock().unwrap();
        if state.fail_search {
            return Err(ChannelError::SearchFailed {
                name: "fake".into(),
                reason: "offline".into(),
            });
        }
        Ok(state.threads.clone())
    }

    async fn send(&self, reply: &OutgoingReply) -> Result<(), ChannelError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send_to.contains(&reply.to) {
            return Err(ChannelError::SendFailed {
                name: "fake".into(),
                reason: "rejected".into(),
            });
        }
        state.sent.push(reply.clone());
        Ok(())
    }

    async fn draft(&self, reply: &OutgoingReply) -> Result<(), ChannelError> {
        self.state.lock().unwrap().drafts.push(reply.clone());
        Ok(())
    }

    async fn add_label(&self, thread: &MailThread, label: &str) -> Result<(), ChannelError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_labels {
            return Err(ChannelError::LabelFailed {
                name: "fake".into(),
                thread_id: thread.id.clone(),
                reason: "label service down".into(),
            });
        }
        if let Some(t) = state.threads.iter_mut().find(|t| t.id == thread.id) {
            t.labels.push(label.to_string());
        }
        Ok(())
    }
}

struct FakeCustomizer {
    succeed: bool,
    calls: Mutex<Vec<(String, RoleTag)>>,
}

impl FakeCustomizer {
    fn new(succeed: bool) -> Self {
        Self {
            succeed,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, RoleTag)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentCustomizer for FakeCustomizer {
    async fn request_customization(
        &self,
        job_description: &str,
        role: RoleTag,
    ) -> Option<CustomizedDocument> {
        self.calls
            .lock()
            .unwrap()
            .push((job_description.to_string(), role));
        self.succeed.then(|| CustomizedDocument {
            filename: format!("resume_{role}.docx"),
            bytes: b"PK".to_vec(),
        })
    }

    async fn check_health(&self) -> bool {
        self.succeed
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn contact() -> ContactDetails {
    ContactDetails {
        name: "Pat Lee".into(),
        email: "pat@example.com".into(),
        phone: Some("+1 555 0100".into()),
        profile_url: None,
        rate: "$60/hour".into(),
        availability: "Immediately available to start".into(),
    }
}

fn config() -> TriageConfig {
    TriageConfig::with_contact(contact())
}

fn make_thread(id: &str, sender: &str, subject: &str, body: &str) -> MailThread {
    MailThread {
        id: id.into(),
        messages: vec![MailMessage {
            id: format!("{id}-1"),
            sender: sender.into(),
            sender_name: None,
            subject: subject.into(),
            body: body.into(),
            headers: vec![],
            received_at: Utc::now(),
        }],
        labels: vec![],
    }
}

fn devops_thread(id: &str) -> MailThread {
    make_thread(
        id,
        "recruiter@acme.com",
        "DevOps Contract Role",
        "We are hiring a Kubernetes and Terraform engineer. Remote.",
    )
}

struct Harness {
    pipeline: TriagePipeline,
    mailbox: Arc<FakeMailbox>,
    customizer: Arc<FakeCustomizer>,
    ledger: Arc<RecipientLedger>,
    store: Arc<MemoryStore>,
}

async fn harness_with(
    config: TriageConfig,
    mailbox: FakeMailbox,
    customizer: FakeCustomizer,
) -> Harness {
    let mailbox = Arc::new(mailbox);
    let customizer = Arc::new(customizer);
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(RecipientLedger::open(store.clone()).await);
    let pipeline = TriagePipeline::new(
        Arc::new(config),
        mailbox.clone(),
        customizer.clone(),
        ledger.clone(),
    );
    Harness {
        pipeline,
        mailbox,
        customizer,
        ledger,
        store,
    }
}

async fn harness(threads: Vec<MailThread>) -> Harness {
    harness_with(
        config(),
        FakeMailbox::with_threads(threads),
        FakeCustomizer::new(true),
    )
    .await
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn devops_inquiry_gets_customized_reply() {
    let h = harness(vec![devops_thread("t1")]).await;

    let summary = timeout(TEST_TIMEOUT, h.pipeline.run()).await.unwrap().unwrap();
    assert_eq!(summary.replied, 1);
    assert_eq!(summary.with_attachment, 1);

    let calls = h.customizer.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, RoleTag::Devops);
    assert!(calls[0].0.contains("Kubernetes and Terraform"));

    let sent = h.mailbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "recruiter@acme.com");
    assert_eq!(sent[0].subject, "Re: DevOps Contract Role");
    assert_eq!(
        sent[0].attachment.as_ref().map(|a| a.filename.as_str()),
        Some("resume_devops.docx")
    );
    assert!(sent[0].body.contains("* Phone: +1 555 0100"));

    let record = h.ledger.get("recruiter@acme.com").await.unwrap();
    assert_eq!(record.role_type, Some(RoleTag::Devops));
    assert_eq!(h.mailbox.labels("t1"), vec!["AutoReplied"]);
    assert!(h.store.raw().unwrap().contains("recruiter@acme.com"));
}

#[tokio::test]
async fn forwarded_inquiry_replies_to_embedded_address() {
    let h = harness(vec![make_thread(
        "t1",
        "brenda@zenspaceit.com",
        "Job opportunity",
        "Please reach out to client@realcompany.com regarding a position.",
    )])
    .await;

    h.pipeline.run().await.unwrap();

    let sent = h.mailbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "client@realcompany.com");
    assert!(sent[0].body.starts_with("Hi client,"));
    assert!(!sent[0].body.contains("brenda"));
    assert!(h.ledger.has("client@realcompany.com").await);
    assert!(!h.ledger.has("brenda@zenspaceit.com").await);
}

#[tokio::test]
async fn known_recipient_is_marked_without_send() {
    let h = harness(vec![devops_thread("t2")]).await;
    h.ledger
        .record_contact("Recruiter@Acme.com", "Cloud Engineer", Some(RoleTag::Devops))
        .await
        .unwrap();

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.replied, 0);
    assert!(h.mailbox.sent().is_empty());
    assert!(h.customizer.calls().is_empty());
    assert_eq!(h.mailbox.labels("t2"), vec!["AutoReplied"]);
}

#[tokio::test]
async fn newsletter_is_left_untouched() {
    let h = harness(vec![make_thread(
        "t1",
        "news@company.com",
        "Quarterly Newsletter",
        "Here is what happened this quarter.",
    )])
    .await;

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.not_recruiting, 1);
    assert!(h.mailbox.sent().is_empty());
    assert!(h.mailbox.labels("t1").is_empty());
    assert!(h.ledger.is_empty().await);
    assert_eq!(h.store.save_count(), 0);
}

#[tokio::test]
async fn excluded_sender_never_gets_reply() {
    let h = harness(vec![make_thread(
        "t1",
        "noreply@jobs.example.com",
        "Urgent hiring: DevOps contract role",
        "Kubernetes, Terraform, AWS.",
    )])
    .await;

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.excluded, 1);
    assert!(h.mailbox.sent().is_empty());
    assert!(h.customizer.calls().is_empty());
    assert!(h.mailbox.labels("t1").is_empty());
}

#[tokio::test]
async fn customization_failure_still_replies() {
    let h = harness_with(
        config(),
        FakeMailbox::with_threads(vec![devops_thread("t1")]),
        FakeCustomizer::new(false),
    )
    .await;

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.replied, 1);
    assert_eq!(summary.with_attachment, 0);
    assert_eq!(h.customizer.calls().len(), 1);

    let sent = h.mailbox.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].attachment.is_none());
    assert!(h.ledger.has("recruiter@acme.com").await);
}

#[tokio::test]
async fn no_role_means_no_customization_attempt() {
    let h = harness(vec![make_thread(
        "t1",
        "talent@agency.io",
        "Contract opening",
        "Are you open to new work?",
    )])
    .await;

    h.pipeline.run().await.unwrap();
    assert!(h.customizer.calls().is_empty());
    let sent = h.mailbox.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].attachment.is_none());
    assert_eq!(
        h.ledger.get("talent@agency.io").await.unwrap().role_type,
        None
    );
}

#[tokio::test]
async fn already_processed_thread_is_skipped() {
    let mut thread = devops_thread("t1");
    thread.labels.push("autoreplied".into());
    let h = harness(vec![thread]).await;

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.already_processed, 1);
    assert!(h.mailbox.sent().is_empty());
}

#[tokio::test]
async fn draft_mode_saves_draft_instead_of_sending() {
    let mut config = config();
    config.auto_send = false;
    let h = harness_with(
        config,
        FakeMailbox::with_threads(vec![devops_thread("t1")]),
        FakeCustomizer::new(true),
    )
    .await;

    let outcome = h
        .pipeline
        .process_thread(&devops_thread("t1"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ThreadOutcome::Replied {
            recipient: "recruiter@acme.com".into(),
            role: Some(RoleTag::Devops),
            attached: true,
            drafted: true,
        }
    );
    assert!(h.mailbox.sent().is_empty());
    assert_eq!(h.mailbox.drafts().len(), 1);
    assert!(h.ledger.has("recruiter@acme.com").await);
}

// ── Failure handling ────────────────────────────────────────────────

#[tokio::test]
async fn failed_thread_does_not_stop_the_run() {
    let mailbox = FakeMailbox::with_threads(vec![
        devops_thread("t1"),
        make_thread(
            "t2",
            "hr@startup.io",
            "Verification engineer position",
            "UVM and SystemVerilog testbench work.",
        ),
    ]);
    mailbox
        .state
        .lock()
        .unwrap()
        .fail_send_to
        .insert("recruiter@acme.com".into());
    let h = harness_with(config(), mailbox, FakeCustomizer::new(true)).await;

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.replied, 1);

    assert!(h.mailbox.labels("t1").is_empty());
    assert!(!h.ledger.has("recruiter@acme.com").await);
    assert_eq!(h.mailbox.labels("t2"), vec!["AutoReplied"]);
    assert_eq!(
        h.ledger.get("hr@startup.io").await.unwrap().role_type,
        Some(RoleTag::Verification)
    );
}

#[tokio::test]
async fn search_failure_aborts_run() {
    let mailbox = FakeMailbox::default();
    mailbox.state.lock().unwrap().fail_search = true;
    let h = harness_with(config(), mailbox, FakeCustomizer::new(true)).await;

    let err = h.pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::ChannelFetch(_)));
}

#[tokio::test]
async fn empty_thread_is_a_failure_not_a_panic() {
    let h = harness(vec![MailThread {
        id: "empty".into(),
        messages: vec![],
        labels: vec![],
    }])
    .await;

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn corrupt_ledger_degrades_to_empty() {
    let mailbox = Arc::new(FakeMailbox::with_threads(vec![devops_thread("t1")]));
    let store = Arc::new(MemoryStore::with_raw("[[[ not a ledger"));
    let ledger = Arc::new(RecipientLedger::open(store.clone()).await);
    let pipeline = TriagePipeline::new(
        Arc::new(config()),
        mailbox.clone(),
        Arc::new(FakeCustomizer::new(true)),
        ledger,
    );

    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.replied, 1);
    assert!(store.raw().unwrap().contains("recruiter@acme.com"));
}

// ── Multi-run properties ────────────────────────────────────────────

#[tokio::test]
async fn second_run_sends_nothing() {
    let h = harness(vec![
        devops_thread("t1"),
        make_thread("t2", "hr@startup.io", "Hiring", "Remote contract."),
    ])
    .await;

    let first = h.pipeline.run().await.unwrap();
    assert_eq!(first.replied, 2);

    let second = h.pipeline.run().await.unwrap();
    assert_eq!(second.replied, 0);
    assert_eq!(second.already_processed, 2);
    assert_eq!(h.mailbox.sent().len(), 2);
}

#[tokio::test]
async fn unlabelled_thread_is_not_replied_to_twice() {
    let mailbox = FakeMailbox::with_threads(vec![devops_thread("t1")]);
    mailbox.state.lock().unwrap().fail_labels = true;
    let h = harness_with(config(), mailbox, FakeCustomizer::new(true)).await;

    let first = h.pipeline.run().await.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(h.mailbox.sent().len(), 1);
    assert!(h.ledger.has("recruiter@acme.com").await);

    let second = h.pipeline.run().await.unwrap();
    assert_eq!(second.failed, 1);
    assert_eq!(h.mailbox.sent().len(), 1);
}

#[tokio::test]
async fn same_recipient_twice_in_one_run() {
    let h = harness(vec![devops_thread("t1"), devops_thread("t2")]).await;

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.replied, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(h.mailbox.sent().len(), 1);
    assert_eq!(h.mailbox.labels("t2"), vec!["AutoReplied"]);
}

#[tokio::test]
async fn unsaved_contact_still_blocks_second_thread_in_run() {
    let h = harness(vec![devops_thread("t1"), devops_thread("t2")]).await;
    h.store.set_fail_saves(true);

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(h.mailbox.sent().len(), 1);
    assert!(h.mailbox.labels("t1").is_empty());
    assert_eq!(h.mailbox.labels("t2"), vec!["AutoReplied"]);
    assert_eq!(h.store.save_count(), 0);
}

#[tokio::test]
async fn later_thread_from_known_recruiter_is_duplicate() {
    let h = harness(vec![devops_thread("t1")]).await;
    h.pipeline.run().await.unwrap();

    h.mailbox.push_thread(make_thread(
        "t9",
        "RECRUITER@acme.com",
        "Another contract role",
        "Following up.",
    ));
    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.duplicates, 1);
    assert_eq!(h.mailbox.sent().len(), 1);
}

#[tokio::test]
async fn ledger_edits_between_runs_are_honored() {
    let h = harness(vec![devops_thread("t1")]).await;
    h.pipeline.run().await.unwrap();

    // Out-of-band clear through a second handle on the same store.
    let other = RecipientLedger::open(h.store.clone()).await;
    other.clear().await.unwrap();

    h.mailbox.push_thread(devops_thread("t2"));
    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.replied, 1);
    assert_eq!(h.mailbox.sent().len(), 2);
}

const SENDERS: [&str; 4] = [
    "a@agency.com",
    "B@agency.com",
    "b@agency.com",
    "c@staffing.io",
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn each_address_contacted_at_most_once(
        batches in proptest::collection::vec(
            proptest::collection::vec(0usize..SENDERS.len(), 0..5),
            1..4,
        ),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let sent = rt.block_on(async {
            let h = harness(vec![]).await;
            let mut next_id = 0;
            for batch in &batches {
                for idx in batch {
                    next_id += 1;
                    h.mailbox.push_thread(make_thread(
                        &format!("t{next_id}"),
                        SENDERS[*idx],
                        "Contract role",
                        "Remote.",
                    ));
                }
                h.pipeline.run().await.unwrap();
            }
            h.mailbox.sent()
        });

        let mut seen = HashSet::new();
        for reply in &sent {
            prop_assert!(seen.insert(reply.to.to_lowercase()), "duplicate send to {}", reply.to);
        }
        let distinct: HashSet<String> = batches
            .iter()
            .flatten()
            .map(|i| SENDERS[*i].to_lowercase())
            .collect();
        prop_assert_eq!(seen, distinct);
    }
}
