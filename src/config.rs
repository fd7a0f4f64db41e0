//! Configuration types.
//!
//! All configuration is an immutable value built once (from the environment
//! or directly in tests) and passed into the pipeline.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::pipeline::types::RoleTag;

/// Default recruiting keywords.
const DEFAULT_KEYWORDS: &[&str] = &[
    "DevOps",
    "contract",
    "hiring",
    "job opportunity",
    "position",
    "role",
    "recruitment",
    "recruiter",
    "1099",
    "W2",
    "immediate",
    "urgent",
];

const DEFAULT_DFT_TERMS: &[&str] = &[
    "dft",
    "design for test",
    "design-for-test",
    "bist",
    "scan",
    "atpg",
    "jtag",
    "boundary scan",
    "dft engineer",
];

const DEFAULT_PHYSICAL_DESIGN_TERMS: &[&str] = &[
    "physical design",
    "pd",
    "place and route",
    "pnr",
    "layout",
    "floorplan",
    "timing closure",
    "sta",
    "physical designer",
];

const DEFAULT_VERIFICATION_TERMS: &[&str] = &[
    "verification",
    "rtl",
    "verify",
    "uvm",
    "systemverilog",
    "testbench",
    "simulation",
    "functional verification",
    "verification engineer",
    "fpga",
    "asic",
    "vlsi",
];

const DEFAULT_DEVOPS_TERMS: &[&str] = &[
    "devops",
    "dev ops",
    "site reliability",
    "sre",
    "cloud engineer",
    "infrastructure",
    "kubernetes",
    "docker",
    "jenkins",
    "ci/cd",
    "aws",
    "azure",
    "gcp",
    "terraform",
    "ansible",
];

/// Senders that never get an automated reply.
const DEFAULT_EXCLUDE: &[&str] = &[
    "noreply@",
    "no-reply@",
    "reddit.com",
    "linkedin.com",
    "indeed.com",
    "glassdoor.com",
];

/// Senders that forward inquiries on behalf of a third party.
const DEFAULT_INTERMEDIARIES: &[&str] = &["brenda@zenspaceit.com"];

/// Label applied to threads that have been handled.
pub const DEFAULT_PROCESSED_LABEL: &str = "AutoReplied";

/// Where the recipient ledger lives unless `TRIAGE_LEDGER_PATH` says otherwise.
pub const DEFAULT_LEDGER_PATH: &str = "./data/sent-recipients.json";

/// Every 10 minutes (sec min hour day-of-month month day-of-week).
pub const DEFAULT_TRIGGER_SCHEDULE: &str = "0 */10 * * * *";

/// Keyword vocabulary for each role tag.
#[derive(Debug, Clone)]
pub struct RoleVocabularies {
    pub dft: Vec<String>,
    pub physical_design: Vec<String>,
    pub verification: Vec<String>,
    pub devops: Vec<String>,
}

impl RoleVocabularies {
    /// Vocabulary for a single role.
    pub fn terms(&self, role: RoleTag) -> &[String] {
        match role {
            RoleTag::Dft => &self.dft,
            RoleTag::PhysicalDesign => &self.physical_design,
            RoleTag::Verification => &self.verification,
            RoleTag::Devops => &self.devops,
        }
    }
}

impl Default for RoleVocabularies {
    fn default() -> Self {
        Self {
            dft: to_strings(DEFAULT_DFT_TERMS),
            physical_design: to_strings(DEFAULT_PHYSICAL_DESIGN_TERMS),
            verification: to_strings(DEFAULT_VERIFICATION_TERMS),
            devops: to_strings(DEFAULT_DEVOPS_TERMS),
        }
    }
}

/// Static contact details embedded in every reply.
#[derive(Debug, Clone)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile_url: Option<String>,
    pub rate: String,
    pub availability: String,
}

impl ContactDetails {
    /// Build from `CONTACT_*` environment variables.
    ///
    /// `CONTACT_NAME` and `CONTACT_EMAIL` are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let name = require_env("CONTACT_NAME")?;
        let email = require_env("CONTACT_EMAIL")?;
        Ok(Self {
            name,
            email,
            phone: optional_env("CONTACT_PHONE"),
            profile_url: optional_env("CONTACT_PROFILE_URL"),
            rate: optional_env("CONTACT_RATE").unwrap_or_else(|| "$60/hour".to_string()),
            availability: optional_env("CONTACT_AVAILABILITY")
                .unwrap_or_else(|| "Immediately available to start".to_string()),
        })
    }
}

/// Endpoints of the document customization service.
#[derive(Debug, Clone)]
pub struct CustomizerConfig {
    pub submit_url: String,
    pub retrieve_url: String,
    pub health_url: String,
}

impl CustomizerConfig {
    /// Derive the three endpoints from a service base URL.
    pub fn from_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            submit_url: format!("{base}/api/customize-resume"),
            retrieve_url: format!("{base}/api/download-resume"),
            health_url: format!("{base}/api/health"),
        }
    }

    /// Build from `CUSTOMIZER_URL` plus optional per-endpoint overrides.
    pub fn from_env() -> Self {
        let base = optional_env("CUSTOMIZER_URL")
            .unwrap_or_else(|| "http://127.0.0.1:5000".to_string());
        let mut config = Self::from_base_url(&base);
        if let Some(url) = optional_env("CUSTOMIZER_SUBMIT_URL") {
            config.submit_url = url;
        }
        if let Some(url) = optional_env("CUSTOMIZER_RETRIEVE_URL") {
            config.retrieve_url = url;
        }
        if let Some(url) = optional_env("CUSTOMIZER_HEALTH_URL") {
            config.health_url = url;
        }
        config
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Any of these (case-insensitive substring) marks a message as recruiting.
    pub keywords: Vec<String>,
    pub roles: RoleVocabularies,
    /// Sender substrings that are never replied to.
    pub exclude: Vec<String>,
    /// Senders whose messages embed the real recruiter's address.
    pub intermediaries: Vec<String>,
    pub processed_label: String,
    /// Send immediately; when false, save drafts instead.
    pub auto_send: bool,
    /// Mailbox search window ("newer than N days").
    pub search_window_days: u32,
    pub ledger_path: PathBuf,
    /// Cron expression for the periodic trigger.
    pub trigger_schedule: String,
    pub contact: ContactDetails,
}

impl TriageConfig {
    /// Defaults for everything except the contact details.
    pub fn with_contact(contact: ContactDetails) -> Self {
        Self {
            keywords: to_strings(DEFAULT_KEYWORDS),
            roles: RoleVocabularies::default(),
            exclude: to_strings(DEFAULT_EXCLUDE),
            intermediaries: to_strings(DEFAULT_INTERMEDIARIES),
            processed_label: DEFAULT_PROCESSED_LABEL.to_string(),
            auto_send: true,
            search_window_days: 1,
            ledger_path: ledger_path_or_default(None),
            trigger_schedule: DEFAULT_TRIGGER_SCHEDULE.to_string(),
            contact,
        }
    }

    /// `TRIAGE_LEDGER_PATH`, or the default location. Needs no other
    /// variables, so ledger maintenance works without mail credentials.
    pub fn ledger_path_from_env() -> PathBuf {
        ledger_path_or_default(optional_env("TRIAGE_LEDGER_PATH"))
    }

    /// Build from environment variables.
    ///
    /// `own_address` (the mailbox's own address) is always excluded.
    pub fn from_env(own_address: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::with_contact(ContactDetails::from_env()?);

        if let Some(list) = optional_list("TRIAGE_KEYWORDS") {
            config.keywords = list;
        }
        if let Some(list) = optional_list("TRIAGE_EXCLUDE") {
            config.exclude = list;
        }
        if let Some(list) = optional_list("TRIAGE_INTERMEDIARIES") {
            config.intermediaries = list;
        }
        for (var, role) in [
            ("TRIAGE_ROLE_DFT", RoleTag::Dft),
            ("TRIAGE_ROLE_PHYSICAL_DESIGN", RoleTag::PhysicalDesign),
            ("TRIAGE_ROLE_VERIFICATION", RoleTag::Verification),
            ("TRIAGE_ROLE_DEVOPS", RoleTag::Devops),
        ] {
            if let Some(list) = optional_list(var) {
                match role {
                    RoleTag::Dft => config.roles.dft = list,
                    RoleTag::PhysicalDesign => config.roles.physical_design = list,
                    RoleTag::Verification => config.roles.verification = list,
                    RoleTag::Devops => config.roles.devops = list,
                }
            }
        }
        if let Some(own) = own_address.filter(|a| !a.is_empty()) {
            let own = own.to_lowercase();
            if !config.exclude.iter().any(|e| e.eq_ignore_ascii_case(&own)) {
                config.exclude.push(own);
            }
        }
        if let Some(label) = optional_env("TRIAGE_PROCESSED_LABEL") {
            config.processed_label = label;
        }
        if let Some(value) = optional_env("TRIAGE_AUTO_SEND") {
            config.auto_send = parse_bool("TRIAGE_AUTO_SEND", &value)?;
        }
        if let Some(value) = optional_env("TRIAGE_SEARCH_DAYS") {
            config.search_window_days =
                value.parse().map_err(|e| ConfigError::InvalidValue {
                    key: "TRIAGE_SEARCH_DAYS".into(),
                    message: format!("{e}"),
                })?;
        }
        config.ledger_path = Self::ledger_path_from_env();
        if let Some(schedule) = optional_env("TRIAGE_SCHEDULE") {
            config.trigger_schedule = schedule;
        }

        Ok(config)
    }
}

// ── Env helpers ─────────────────────────────────────────────────────

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn require_env(key: &str) -> Result<String, ConfigError> {
    optional_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn ledger_path_or_default(configured: Option<String>) -> PathBuf {
    configured.map_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH), PathBuf::from)
}

/// Comma-separated list; `None` when unset so defaults stay in place.
fn optional_list(key: &str) -> Option<Vec<String>> {
    optional_env(key).map(|raw| split_list(&raw))
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub(crate) fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
