//! Error types for the recruiting triage pipeline.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Customizer error: {0}")]
    Customizer(#[from] CustomizerError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mailbox channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} search failed: {reason}")]
    SearchFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Failed to save draft on channel {name}: {reason}")]
    DraftFailed { name: String, reason: String },

    #[error("Failed to label thread {thread_id} on channel {name}: {reason}")]
    LabelFailed {
        name: String,
        thread_id: String,
        reason: String,
    },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Authentication failed for channel {name}: {reason}")]
    AuthFailed { name: String, reason: String },
}

/// Recipient ledger persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Ledger store unavailable: {0}")]
    Unavailable(String),
}

/// Document customization service errors.
///
/// Never escapes the customizer client: every variant degrades to a reply
/// without an attachment.
#[derive(Debug, thiserror::Error)]
pub enum CustomizerError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Customization rejected: {0}")]
    Rejected(String),

    #[error("Invalid endpoint URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Per-thread pipeline errors. Any of these leaves the thread unmarked.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Thread {0} has no messages")]
    EmptyThread(String),

    #[error("Mailbox search failed: {0}")]
    ChannelFetch(String),

    #[error("Reply delivery failed: {0}")]
    ChannelSend(#[source] ChannelError),

    #[error("Marking thread processed failed: {0}")]
    Label(#[source] ChannelError),

    #[error("Ledger update failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
