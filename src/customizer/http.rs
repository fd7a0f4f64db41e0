//! HTTP client for the document customization service.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::CustomizerConfig;
use crate::customizer::{CustomizedDocument, DocumentCustomizer};
use crate::error::CustomizerError;
use crate::pipeline::types::RoleTag;

/// Characters of a response body kept in log lines.
const LOG_PREVIEW_CHARS: usize = 200;

/// Submission endpoint response.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Health endpoint response. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub claude_api: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// reqwest-backed `DocumentCustomizer`.
pub struct HttpCustomizer {
    config: CustomizerConfig,
    client: reqwest::Client,
}

impl HttpCustomizer {
    pub fn new(config: CustomizerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Both phases, with errors surfaced for logging.
    pub async fn customize(
        &self,
        job_description: &str,
        role: RoleTag,
    ) -> Result<CustomizedDocument, CustomizerError> {
        let filename = self.submit(job_description, role).await?;
        let bytes = self.retrieve(&filename).await?;
        Ok(CustomizedDocument { filename, bytes })
    }

    /// Phase 1: submit the job description, returning the filename token.
    async fn submit(&self, job_description: &str, role: RoleTag) -> Result<String, CustomizerError> {
        let endpoint = &self.config.submit_url;
        debug!(endpoint = %endpoint, role = %role, "Submitting customization request");

        let resp = self
            .client
            .post(endpoint)
            .form(&[
                ("requirements", job_description),
                ("role_type", role.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CustomizerError::RequestFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| CustomizerError::RequestFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
        debug!(
            status = status.as_u16(),
            body = %preview(&text),
            "Customization service responded"
        );

        if !status.is_success() {
            return Err(CustomizerError::Status {
                endpoint: endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let parsed: SubmitResponse =
            serde_json::from_str(&text).map_err(|e| CustomizerError::InvalidResponse {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        match parsed {
            SubmitResponse {
                success: true,
                filename: Some(filename),
                ..
            } if !filename.trim().is_empty() => Ok(filename),
            SubmitResponse { success: true, .. } => Err(CustomizerError::InvalidResponse {
                endpoint: endpoint.clone(),
                reason: "success without filename".into(),
            }),
            SubmitResponse { message, .. } => Err(CustomizerError::Rejected(
                message.unwrap_or_else(|| "Unknown error".into()),
            )),
        }
    }

    /// Phase 2: download the generated document.
    async fn retrieve(&self, filename: &str) -> Result<Vec<u8>, CustomizerError> {
        let url = retrieve_url(&self.config.retrieve_url, filename)?;
        debug!(url = %url, "Downloading customized document");

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CustomizerError::RequestFailed {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(CustomizerError::Status {
                endpoint: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CustomizerError::RequestFailed {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }

    /// Fetch and parse the health document.
    pub async fn health(&self) -> Result<HealthReport, CustomizerError> {
        let endpoint = &self.config.health_url;
        let resp = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| CustomizerError::RequestFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(CustomizerError::Status {
                endpoint: endpoint.clone(),
                status: resp.status().as_u16(),
            });
        }

        resp.json::<HealthReport>()
            .await
            .map_err(|e| CustomizerError::InvalidResponse {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl DocumentCustomizer for HttpCustomizer {
    async fn request_customization(
        &self,
        job_description: &str,
        role: RoleTag,
    ) -> Option<CustomizedDocument> {
        match self.customize(job_description, role).await {
            Ok(doc) => {
                info!(
                    filename = %doc.filename,
                    bytes = doc.bytes.len(),
                    role = %role,
                    "Customized document ready"
                );
                Some(doc)
            }
            Err(e) => {
                warn!(role = %role, error = %e, "Document customization failed");
                None
            }
        }
    }

    async fn check_health(&self) -> bool {
        match self.health().await {
            Ok(report) => {
                info!(
                    service = report.service.as_deref().unwrap_or("unknown"),
                    claude_api = report.claude_api.as_deref().unwrap_or("unknown"),
                    "Customization service is healthy"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Customization service health check failed");
                false
            }
        }
    }
}

/// `<base>/<url-encoded filename>`.
pub fn retrieve_url(base: &str, filename: &str) -> Result<Url, CustomizerError> {
    let invalid = |reason: String| CustomizerError::InvalidUrl {
        url: base.to_string(),
        reason,
    };
    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("URL cannot be a base".into()))?
        .pop_if_empty()
        .push(filename);
    Ok(url)
}

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}
