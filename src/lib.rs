//! Recruit Triage: automated first-response to recruiter emails.
//!
//! Classifies recent inbox threads by keyword, replies once per recruiter
//! with contact details and (when a role is detected) a role-tailored
//! document, and records every contact in a durable ledger.

pub mod channels;
pub mod config;
pub mod customizer;
pub mod error;
pub mod pipeline;
pub mod store;
