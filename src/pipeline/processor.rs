//! Triage pipeline: per-thread state machine over one mailbox batch.
//!
//! Each thread moves through:
//! 1. filter: already-processed label, then sender exclusion
//! 2. classify: recruiting keywords (non-match leaves the thread untouched)
//! 3. dedup: resolve the reply target, consult the ledger
//! 4. customize: only when a role is detected, soft failure
//! 5. compose and deliver: send, or draft in draft mode
//! 6. mark: ledger record, then the processed label
//!
//! Any error inside a thread ends it as `Failed` and leaves it unmarked, so
//! the next run reconsiders it. Threads are processed strictly in order.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::TriageConfig;
use crate::customizer::DocumentCustomizer;
use crate::error::PipelineError;
use crate::pipeline::classifier::{KeywordClassifier, is_excluded};
use crate::pipeline::composer::ReplyComposer;
use crate::pipeline::extract::{job_title, reply_subject, resolve_reply_target};
use crate::pipeline::types::{
    MailThread, Mailbox, OutgoingReply, RunSummary, ThreadOutcome, role_label,
};
use crate::store::RecipientLedger;

/// Orchestrates classifier, ledger, customizer and composer over a mailbox.
pub struct TriagePipeline {
    config: Arc<TriageConfig>,
    classifier: KeywordClassifier,
    composer: ReplyComposer,
    mailbox: Arc<dyn Mailbox>,
    customizer: Arc<dyn DocumentCustomizer>,
    ledger: Arc<RecipientLedger>,
}

impl TriagePipeline {
    pub fn new(
        config: Arc<TriageConfig>,
        mailbox: Arc<dyn Mailbox>,
        customizer: Arc<dyn DocumentCustomizer>,
        ledger: Arc<RecipientLedger>,
    ) -> Self {
        let classifier = KeywordClassifier::new(&config);
        let composer = ReplyComposer::new(config.contact.clone());
        Self {
            config,
            classifier,
            composer,
            mailbox,
            customizer,
            ledger,
        }
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<RecipientLedger> {
        &self.ledger
    }

    /// Run one iteration over the current search window.
    ///
    /// Only a failed mailbox search aborts the run; per-thread errors are
    /// counted as `failed` in the summary.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("triage_run", run_id = %run_id, mailbox = self.mailbox.name());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<RunSummary, PipelineError> {
        self.ledger.reload().await;

        let threads = self
            .mailbox
            .search(self.config.search_window_days)
            .await
            .map_err(|e| PipelineError::ChannelFetch(e.to_string()))?;
        info!(
            threads = threads.len(),
            window_days = self.config.search_window_days,
            "Triage run started"
        );

        let mut summary = RunSummary::default();
        for thread in &threads {
            let outcome = match self.process_thread(thread).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(thread = %thread.id, error = %e, "Thread processing failed");
                    ThreadOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            debug!(thread = %thread.id, outcome = outcome.label(), "Thread done");
            summary.record(&outcome);
        }

        info!(
            threads = summary.threads,
            replied = summary.replied,
            with_attachment = summary.with_attachment,
            already_processed = summary.already_processed,
            excluded = summary.excluded,
            duplicates = summary.duplicates,
            not_recruiting = summary.not_recruiting,
            failed = summary.failed,
            "Triage run finished"
        );
        Ok(summary)
    }

    /// Drive a single thread to a terminal outcome.
    pub async fn process_thread(&self, thread: &MailThread) -> Result<ThreadOutcome, PipelineError> {
        let label = &self.config.processed_label;

        // ── Filter ──────────────────────────────────────────────────
        if thread.has_label(label) {
            return Ok(ThreadOutcome::SkippedAlreadyProcessed);
        }
        let message = thread
            .latest()
            .ok_or_else(|| PipelineError::EmptyThread(thread.id.clone()))?;

        if is_excluded(&message.sender, &self.config.exclude) {
            debug!(thread = %thread.id, sender = %message.sender, "Sender excluded");
            return Ok(ThreadOutcome::SkippedExcluded);
        }

        // ── Classify ────────────────────────────────────────────────
        if !self
            .classifier
            .is_recruiting_signal(&message.subject, &message.body, &message.sender)
        {
            return Ok(ThreadOutcome::NotRecruiting);
        }

        // ── Dedup ───────────────────────────────────────────────────
        let target = resolve_reply_target(
            message,
            &self.config.intermediaries,
            &self.config.exclude,
        );
        if target.via_intermediary {
            info!(
                thread = %thread.id,
                intermediary = %message.sender,
                recipient = %target.address,
                "Forwarded inquiry, replying to embedded address"
            );
        }

        if self.ledger.has(&target.address).await {
            info!(thread = %thread.id, recipient = %target.address, "Already contacted, marking only");
            self.mailbox
                .add_label(thread, label)
                .await
                .map_err(PipelineError::Label)?;
            return Ok(ThreadOutcome::SkippedDuplicate {
                recipient: target.address,
            });
        }

        // ── Customize ───────────────────────────────────────────────
        let role = self.classifier.detect_role(&message.subject, &message.body);
        let attachment = match role {
            Some(role) => {
                self.customizer
                    .request_customization(&message.body, role)
                    .await
            }
            None => {
                debug!(thread = %thread.id, "No role detected, replying without attachment");
                None
            }
        };
        if role.is_some() && attachment.is_none() {
            warn!(thread = %thread.id, role = role_label(role), "Sending reply without customized document");
        }

        // ── Compose and deliver ─────────────────────────────────────
        let title = job_title(&message.subject, &message.body);
        let reply = OutgoingReply {
            to: target.address.clone(),
            subject: reply_subject(&message.subject),
            body: self.composer.compose(&target.display_name, &title),
            attachment,
        };
        let attached = reply.attachment.is_some();
        let drafted = !self.config.auto_send;

        let delivered = if drafted {
            self.mailbox.draft(&reply).await
        } else {
            self.mailbox.send(&reply).await
        };
        delivered.map_err(PipelineError::ChannelSend)?;

        // ── Mark ────────────────────────────────────────────────────
        self.ledger
            .record_contact(&target.address, &title, role)
            .await?;
        self.mailbox
            .add_label(thread, label)
            .await
            .map_err(PipelineError::Label)?;

        info!(
            thread = %thread.id,
            recipient = %target.address,
            role = role_label(role),
            job_title = %title,
            attached,
            drafted,
            "Replied to recruiter"
        );
        Ok(ThreadOutcome::Replied {
            recipient: target.address,
            role,
            attached,
            drafted,
        })
    }
}
