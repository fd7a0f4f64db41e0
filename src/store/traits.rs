//! `LedgerStore` trait: durable backing for the recipient ledger.
//!
//! The ledger is a single document: normalized address → record. Stores load
//! and replace it whole, so every save is all-or-nothing. Reading is lenient
//! per record: a damaged entry keeps its address with default fields.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::error::LedgerError;
use crate::pipeline::types::RoleTag;

/// One contacted recipient. Never mutated after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientRecord {
    /// When the reply went out (ISO-8601). Unreadable values load as the
    /// Unix epoch.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Job title extracted at contact time.
    #[serde(default)]
    pub job_title: String,
    /// Role used for the attachment; `"none"` when no role was detected.
    #[serde(
        default,
        serialize_with = "serialize_role",
        deserialize_with = "deserialize_role"
    )]
    pub role_type: Option<RoleTag>,
}

/// The whole persisted ledger, keyed by lower-cased address.
pub type LedgerDocument = BTreeMap<String, RecipientRecord>;

/// Parse a serialized ledger document.
///
/// Fails only when `raw` is not a JSON object. An entry whose value cannot
/// be read as a record is kept with default fields.
pub fn parse_document(raw: &str) -> Result<LedgerDocument, LedgerError> {
    let entries: serde_json::Map<String, Value> = serde_json::from_str(raw)?;
    let mut document = LedgerDocument::new();
    for (address, value) in entries {
        let record = RecipientRecord::deserialize(&value).unwrap_or_else(|e| {
            warn!(recipient = %address, error = %e, "Unreadable ledger record, keeping address");
            RecipientRecord::default()
        });
        document.insert(address, record);
    }
    Ok(document)
}

/// Backend-agnostic ledger persistence.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Human-readable location for logs.
    fn describe(&self) -> String;

    /// Load the full document. A missing document is an empty ledger.
    async fn load(&self) -> Result<LedgerDocument, LedgerError>;

    /// Atomically replace the stored document.
    async fn save(&self, document: &LedgerDocument) -> Result<(), LedgerError>;
}

fn serialize_role<S: Serializer>(role: &Option<RoleTag>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(crate::pipeline::types::role_label(*role))
}

/// Accepts a role name, `"none"`, or `null`. Anything else reads as no role.
fn deserialize_role<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RoleTag>, D::Error> {
    let raw: Option<Value> = Option::deserialize(d)?;
    let role = match raw.as_ref().map(|v| v.as_str().map(str::trim)) {
        None | Some(Some("" | "none")) => None,
        Some(Some(name)) => match name.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!(role = name, error = %e, "Unknown ledger role, reading as none");
                None
            }
        },
        Some(None) => {
            warn!(value = ?raw, "Ledger role is not a string, reading as none");
            None
        }
    };
    Ok(role)
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw: Option<Value> = Option::deserialize(d)?;
    let parsed = raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| s.trim().parse::<DateTime<Utc>>().ok());
    Ok(parsed.unwrap_or_else(|| {
        warn!(value = ?raw, "Unreadable ledger timestamp, using epoch");
        DateTime::<Utc>::default()
    }))
}
