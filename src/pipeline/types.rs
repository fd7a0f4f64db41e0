//! Shared types for the triage pipeline.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::customizer::CustomizedDocument;
use crate::error::ChannelError;

// ── Role tag ────────────────────────────────────────────────────────

/// Coarse job category derived from keyword vocabularies.
///
/// "No role detected" is `Option::<RoleTag>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTag {
    Dft,
    PhysicalDesign,
    Verification,
    Devops,
}

impl RoleTag {
    /// Detection priority, most specialized first.
    pub const PRIORITY: [RoleTag; 4] = [
        RoleTag::Dft,
        RoleTag::PhysicalDesign,
        RoleTag::Verification,
        RoleTag::Devops,
    ];

    /// Wire name, as sent in `role_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dft => "dft",
            Self::PhysicalDesign => "physical_design",
            Self::Verification => "verification",
            Self::Devops => "devops",
        }
    }
}

impl fmt::Display for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dft" => Ok(Self::Dft),
            "physical_design" => Ok(Self::PhysicalDesign),
            "verification" => Ok(Self::Verification),
            "devops" => Ok(Self::Devops),
            other => Err(format!("unknown role tag: '{other}'")),
        }
    }
}

/// Label for an optional role, `"none"` when absent.
pub fn role_label(role: Option<RoleTag>) -> &'static str {
    role.map_or("none", |r| r.as_str())
}

// ── Mailbox entities ────────────────────────────────────────────────

/// A single message as read from the mailbox. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailMessage {
    /// Provider-native message ID (IMAP UID for the IMAP mailbox).
    pub id: String,
    /// Sender email address.
    pub sender: String,
    /// Display name from the From header, if any.
    pub sender_name: Option<String>,
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Raw header name/value pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    pub received_at: DateTime<Utc>,
}

/// A conversation grouping of messages plus its label set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailThread {
    pub id: String,
    /// Messages in chronological order.
    pub messages: Vec<MailMessage>,
    pub labels: Vec<String>,
}

impl MailThread {
    /// The most recent message in the thread.
    pub fn latest(&self) -> Option<&MailMessage> {
        self.messages.last()
    }

    /// Whether the thread carries `label` (case-insensitive).
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

/// An automated reply ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingReply {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<CustomizedDocument>,
}

// ── Mailbox trait ───────────────────────────────────────────────────

/// Mailbox I/O. Holds no triage logic.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Mailbox name for logging (e.g. "imap").
    fn name(&self) -> &str;

    /// Threads with activity in the last `newer_than_days` days, oldest first.
    async fn search(&self, newer_than_days: u32) -> Result<Vec<MailThread>, ChannelError>;

    /// Send a reply immediately.
    async fn send(&self, reply: &OutgoingReply) -> Result<(), ChannelError>;

    /// Save a reply as a draft instead of sending it.
    async fn draft(&self, reply: &OutgoingReply) -> Result<(), ChannelError>;

    /// Apply `label` to every message of `thread`, creating it if needed.
    async fn add_label(&self, thread: &MailThread, label: &str) -> Result<(), ChannelError>;
}

// ── Outcomes ────────────────────────────────────────────────────────

/// Terminal state of one thread in one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadOutcome {
    /// Reply sent (or drafted) and thread marked.
    Replied {
        recipient: String,
        role: Option<RoleTag>,
        attached: bool,
        drafted: bool,
    },
    /// Thread already carried the processed label.
    SkippedAlreadyProcessed,
    /// Sender matched an exclusion pattern.
    SkippedExcluded,
    /// Recipient already in the ledger; thread marked without a send.
    SkippedDuplicate { recipient: String },
    /// No recruiting keyword; thread left untouched.
    NotRecruiting,
    /// Unexpected error; thread left unmarked for the next run.
    Failed { reason: String },
}

impl ThreadOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Replied { .. } => "replied",
            Self::SkippedAlreadyProcessed => "skipped_already_processed",
            Self::SkippedExcluded => "skipped_excluded",
            Self::SkippedDuplicate { .. } => "skipped_duplicate",
            Self::NotRecruiting => "not_recruiting",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Per-run outcome counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub threads: usize,
    pub replied: usize,
    pub with_attachment: usize,
    pub already_processed: usize,
    pub excluded: usize,
    pub duplicates: usize,
    pub not_recruiting: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &ThreadOutcome) {
        self.threads += 1;
        match outcome {
            ThreadOutcome::Replied { attached, .. } => {
                self.replied += 1;
                if *attached {
                    self.with_attachment += 1;
                }
            }
            ThreadOutcome::SkippedAlreadyProcessed => self.already_processed += 1,
            ThreadOutcome::SkippedExcluded => self.excluded += 1,
            ThreadOutcome::SkippedDuplicate { .. } => self.duplicates += 1,
            ThreadOutcome::NotRecruiting => self.not_recruiting += 1,
            ThreadOutcome::Failed { .. } => self.failed += 1,
        }
    }
}
