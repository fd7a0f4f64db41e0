//! Field extraction from the latest message: reply target, recruiter name,
//! job title. Pure string/regex work.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::classifier::is_excluded;
use crate::pipeline::types::MailMessage;

/// Greeting name when nothing better is found.
pub const FALLBACK_NAME: &str = "there";

/// Job title when nothing better is found.
pub const FALLBACK_JOB_TITLE: &str = "the opportunity";

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email regex")
});

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"My name is ([A-Za-z\s]+)[.,;]",
        r"I'm ([A-Za-z\s]+),",
        r"This is ([A-Za-z\s]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid name regex"))
    .collect()
});

static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)Job Title[:\s]+([^\n\r]+)",
        r"(?i)Position[:\s]+([^\n\r]+)",
        r"(?i)Role[:\s]+([^\n\r]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid title regex"))
    .collect()
});

static REPLY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*re:\s*").expect("valid prefix regex"));

/// Who the reply goes to and how to greet them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub address: String,
    pub display_name: String,
    /// True when the address was pulled out of a forwarded message body.
    pub via_intermediary: bool,
}

/// Resolve the reply target for `message`.
///
/// Messages from a forwarding intermediary are answered at the first
/// embedded, non-excluded address in the body (greeted by its local part);
/// if none survives, the intermediary itself is answered. Everyone else is
/// answered at the sender address.
pub fn resolve_reply_target(
    message: &MailMessage,
    intermediaries: &[String],
    exclude: &[String],
) -> ReplyTarget {
    if is_intermediary(&message.sender, intermediaries) {
        let address = embedded_addresses(&message.body)
            .into_iter()
            .find(|a| !is_excluded(a, exclude) && !a.eq_ignore_ascii_case(&message.sender))
            .unwrap_or_else(|| message.sender.clone());
        let display_name = local_part(&address).to_string();
        return ReplyTarget {
            address,
            display_name,
            via_intermediary: true,
        };
    }

    ReplyTarget {
        address: message.sender.clone(),
        display_name: recruiter_name(message),
        via_intermediary: false,
    }
}

/// Whether `sender` is a configured forwarding intermediary.
pub fn is_intermediary(sender: &str, intermediaries: &[String]) -> bool {
    let sender = sender.to_lowercase();
    intermediaries
        .iter()
        .filter(|i| !i.is_empty())
        .any(|i| sender.contains(&i.to_lowercase()))
}

/// All email addresses in `text`, in order of appearance.
pub fn embedded_addresses(text: &str) -> Vec<String> {
    EMAIL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Part of an address before `@`.
pub fn local_part(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

/// Recruiter name: From display name, then body self-introductions.
pub fn recruiter_name(message: &MailMessage) -> String {
    if let Some(name) = message
        .sender_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        return name.to_string();
    }
    for pattern in NAME_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&message.body) {
            let name = caps[1].trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    FALLBACK_NAME.to_string()
}

/// Job title from labelled lines, else an engineering subject line.
pub fn job_title(subject: &str, body: &str) -> String {
    let text = format!("{subject} {body}");
    for pattern in TITLE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&text) {
            let title = caps[1].trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }
    if ["Engineer", "Developer", "DevOps"]
        .iter()
        .any(|w| subject.contains(w))
    {
        return REPLY_PREFIX.replace(subject, "").trim().to_string();
    }
    FALLBACK_JOB_TITLE.to_string()
}

/// Reply subject: `Re: ` prefix, never doubled.
pub fn reply_subject(subject: &str) -> String {
    if REPLY_PREFIX.is_match(subject) {
        subject.trim().to_string()
    } else {
        format!("Re: {}", subject.trim())
    }
}
