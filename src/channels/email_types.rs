//! Email parsing helpers: raw message → `MailMessage`, conversation threading,
//! IMAP atom quoting. Pure functions, no network.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use regex::Regex;

use crate::pipeline::types::{MailMessage, MailThread};

static UID_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bUID (\d+)").expect("valid uid regex"));

static FLAGS_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bFLAGS \(([^)]*)\)").expect("valid flags regex"));

static SUBJECT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(re|fwd?|aw|wg)\s*(\[\d+\])?\s*:\s*").expect("valid prefix regex")
});

/// A message fetched over IMAP together with its flags.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub message: MailMessage,
    pub flags: Vec<String>,
}

/// Parse one RFC 5322 message. `uid` becomes the message ID.
pub fn parse_message(uid: &str, raw: &[u8]) -> Option<MailMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let from = parsed.from().and_then(|addr| addr.first());
    let sender = from
        .and_then(|a| a.address())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".into());
    let sender_name = from
        .and_then(|a| a.name())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let subject = parsed.subject().unwrap_or("(no subject)").to_string();
    let body = extract_text(&parsed);

    let received_at = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    let mut headers = Vec::new();
    if let Some(id) = parsed.message_id() {
        headers.push(("Message-ID".to_string(), id.to_string()));
    }
    for name in ["In-Reply-To", "References"] {
        let ids = raw_header(raw, name)
            .map(|value| angle_ids(&value))
            .unwrap_or_default();
        if !ids.is_empty() {
            headers.push((name.to_string(), ids.join(" ")));
        }
    }

    Some(MailMessage {
        id: uid.to_string(),
        sender,
        sender_name,
        subject,
        body,
        headers,
        received_at,
    })
}

/// Unfolded value of the first header called `name` in the header block.
fn raw_header(raw: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut found: Option<String> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(value) = found.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if found.is_some() {
            break;
        }
        if let Some((key, value)) = line.split_once(':')
            && key.trim().eq_ignore_ascii_case(name)
        {
            found = Some(value.trim().to_string());
        }
    }
    found
}

/// Message IDs inside angle brackets, brackets removed.
fn angle_ids(value: &str) -> Vec<String> {
    value
        .split('<')
        .skip(1)
        .filter_map(|chunk| chunk.split_once('>'))
        .map(|(id, _)| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Readable text: plain part, else stripped HTML, else a text attachment.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.to_string();
        }
    }
    String::new()
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an untagged `FETCH` response. `text` is the response with literal
/// contents removed; `literal` is the `BODY[]` payload.
pub fn parse_fetch(text: &str, literal: &[u8]) -> Option<FetchedMessage> {
    let uid = UID_ITEM.captures(text)?.get(1)?.as_str();
    let flags = FLAGS_ITEM
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().map(String::from).collect())
        .unwrap_or_default();
    let message = parse_message(uid, literal)?;
    Some(FetchedMessage { message, flags })
}

/// Numbers from an untagged `* SEARCH` line.
pub fn parse_search(line: &str) -> Vec<String> {
    line.strip_prefix("* SEARCH")
        .map(|rest| rest.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}

/// Subject with reply/forward prefixes removed, case-folded.
pub fn normalize_subject(subject: &str) -> String {
    let mut current = subject.trim();
    while let Some(m) = SUBJECT_PREFIX.find(current) {
        current = current[m.end()..].trim_start();
    }
    let folded = current
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if folded.is_empty() {
        "(no subject)".to_string()
    } else {
        folded
    }
}

/// Group fetched messages into conversations.
///
/// A message joins the thread holding any ID named in its `In-Reply-To` or
/// `References` headers. Otherwise it is keyed on normalized subject plus
/// lower-cased sender, so two people using the same subject line stay
/// apart. Messages within a thread and threads themselves are ordered
/// oldest first. A thread's labels are the union of its messages' keyword
/// flags (system flags such as `\Seen` are dropped). The thread ID is the
/// UID of its first message.
pub fn group_into_threads(mut fetched: Vec<FetchedMessage>) -> Vec<MailThread> {
    fetched.sort_by_key(|f| f.message.received_at);

    let mut by_message_id: HashMap<String, usize> = HashMap::new();
    let mut by_subject: HashMap<(String, String), usize> = HashMap::new();
    let mut threads: Vec<MailThread> = Vec::new();

    for FetchedMessage { message, flags } in fetched {
        let linked = header_ids(&message, "In-Reply-To")
            .chain(header_ids(&message, "References"))
            .find_map(|id| by_message_id.get(id).copied());
        let slot = match linked {
            Some(slot) => slot,
            None => {
                let key = (
                    normalize_subject(&message.subject),
                    message.sender.to_lowercase(),
                );
                *by_subject.entry(key).or_insert_with(|| {
                    threads.push(MailThread {
                        id: message.id.clone(),
                        messages: Vec::new(),
                        labels: Vec::new(),
                    });
                    threads.len() - 1
                })
            }
        };
        for id in header_ids(&message, "Message-ID") {
            by_message_id.entry(id.to_string()).or_insert(slot);
        }
        let thread = &mut threads[slot];
        for flag in flags.into_iter().filter(|f| !f.starts_with('\\')) {
            if !thread.labels.iter().any(|l| l.eq_ignore_ascii_case(&flag)) {
                thread.labels.push(flag);
            }
        }
        thread.messages.push(message);
    }
    threads
}

fn header_ids<'a>(message: &'a MailMessage, name: &str) -> impl Iterator<Item = &'a str> {
    message
        .headers
        .iter()
        .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
        .flat_map(|(_, value)| value.split_whitespace())
}

/// IMAP `SINCE` date for a window of `days` ending at `now`.
pub fn since_date(now: DateTime<Utc>, days: u32) -> String {
    (now - Duration::days(i64::from(days)))
        .format("%d-%b-%Y")
        .to_string()
}

/// Label as an IMAP keyword atom. Characters outside the atom grammar
/// become `_`.
pub fn keyword_flag(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '(' | ')' | '{' | ' ' | '%' | '*' | '"' | '\\' | ']' => '_',
            c if c.is_ascii_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect()
}

/// IMAP quoted string.
pub fn imap_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
