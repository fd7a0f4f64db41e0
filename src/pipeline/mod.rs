//! Recruiting-email triage pipeline.
//!
//! Every candidate thread flows through:
//! 1. `Mailbox::search()` for the recent window
//! 2. exclusion and already-processed filters
//! 3. `KeywordClassifier`: recruiting signal and role
//! 4. `RecipientLedger` dedup on the resolved reply target
//! 5. `DocumentCustomizer` when a role was detected
//! 6. `ReplyComposer`, then send or draft
//! 7. ledger record and processed label

pub mod classifier;
pub mod composer;
pub mod extract;
pub mod processor;
pub mod trigger;
pub mod types;

pub use classifier::KeywordClassifier;
pub use composer::ReplyComposer;
pub use processor::TriagePipeline;
pub use trigger::TriageTrigger;
pub use types::{
    MailMessage, MailThread, Mailbox, OutgoingReply, RoleTag, RunSummary, ThreadOutcome,
};
