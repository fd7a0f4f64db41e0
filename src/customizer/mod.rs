//! Document customization service client.
//!
//! Two-phase protocol, one attempt per message, no retries:
//! 1. `POST submit` with form fields `requirements` and `role_type`,
//!    answered by `{ "success": bool, "filename"?: str, "message"?: str }`
//! 2. `GET retrieve/<filename>` returning the document bytes
//!
//! Every failure is soft: `request_customization` returns `None` and the
//! caller sends its reply without an attachment.

pub mod http;

use async_trait::async_trait;

use crate::pipeline::types::RoleTag;

pub use http::{HealthReport, HttpCustomizer};

/// A generated document, ready to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomizedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl CustomizedDocument {
    /// MIME type guessed from the filename extension.
    pub fn content_type(&self) -> &'static str {
        let ext = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("docx") => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Some("pdf") => "application/pdf",
            Some("txt") => "text/plain",
            _ => "application/octet-stream",
        }
    }
}

/// Customization capability used by the pipeline.
#[async_trait]
pub trait DocumentCustomizer: Send + Sync {
    /// Request a document tailored to `job_description` for `role`.
    ///
    /// Returns `None` on any failure.
    async fn request_customization(
        &self,
        job_description: &str,
        role: RoleTag,
    ) -> Option<CustomizedDocument>;

    /// Diagnostic probe; never gates the pipeline.
    async fn check_health(&self) -> bool;
}
