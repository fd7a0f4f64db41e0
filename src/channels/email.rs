//! IMAP/SMTP mailbox: raw IMAP over rustls for search, labels and drafts,
//! SMTP via lettre for sending.
//!
//! Every operation opens its own IMAP session inside `spawn_blocking` and
//! logs out when done. Labels are IMAP keyword flags, so they survive across
//! runs and across clients that show keywords.

use std::io::{BufRead, BufReader, Read, Write as IoWrite};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::channels::email_types::{
    FetchedMessage, group_into_threads, imap_quote, keyword_flag, parse_fetch, parse_search,
    since_date,
};
use crate::config::{optional_env, require_env};
use crate::error::{ChannelError, ConfigError};
use crate::pipeline::types::{MailThread, Mailbox, OutgoingReply};

/// Socket read timeout for IMAP.
const IMAP_READ_TIMEOUT_SECS: u64 = 30;

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    /// Folder searched for inbound threads.
    pub inbox: String,
    /// Folder drafts are appended to.
    pub drafts_mailbox: String,
}

impl EmailConfig {
    /// Build config from `EMAIL_*` environment variables.
    ///
    /// `EMAIL_IMAP_HOST`, `EMAIL_USERNAME` and `EMAIL_PASSWORD` are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_host = require_env("EMAIL_IMAP_HOST")?;
        let imap_port = port_env("EMAIL_IMAP_PORT", 993)?;
        let smtp_host =
            optional_env("EMAIL_SMTP_HOST").unwrap_or_else(|| imap_host.replace("imap", "smtp"));
        let smtp_port = port_env("EMAIL_SMTP_PORT", 587)?;

        let username = require_env("EMAIL_USERNAME")?;
        let password = SecretString::from(require_env("EMAIL_PASSWORD")?);
        let from_address = optional_env("EMAIL_FROM_ADDRESS").unwrap_or_else(|| username.clone());

        Ok(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            inbox: optional_env("EMAIL_INBOX").unwrap_or_else(|| "INBOX".into()),
            drafts_mailbox: optional_env("EMAIL_DRAFTS_MAILBOX").unwrap_or_else(|| "Drafts".into()),
        })
    }
}

fn port_env(key: &str, default: u16) -> Result<u16, ConfigError> {
    match optional_env(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("invalid port '{raw}': {e}"),
        }),
    }
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// `Mailbox` backed by an IMAP account and its SMTP relay.
pub struct ImapMailbox {
    config: EmailConfig,
}

impl ImapMailbox {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// The account's own address.
    pub fn own_address(&self) -> &str {
        &self.config.from_address
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(EmailConfig) -> Result<T, ImapError> + Send + 'static,
    {
        let config = self.config.clone();
        match tokio::task::spawn_blocking(move || op(config)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("mailbox task panicked: {e}")),
        }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    fn name(&self) -> &str {
        "imap"
    }

    async fn search(&self, newer_than_days: u32) -> Result<Vec<MailThread>, ChannelError> {
        let fetched = self
            .blocking(move |config| fetch_recent(&config, newer_than_days))
            .await
            .map_err(|reason| ChannelError::SearchFailed {
                name: "imap".into(),
                reason,
            })?;
        debug!(messages = fetched.len(), "Fetched recent messages");
        Ok(group_into_threads(fetched))
    }

    async fn send(&self, reply: &OutgoingReply) -> Result<(), ChannelError> {
        let reply = reply.clone();
        let to = reply.to.clone();
        self.blocking(move |config| send_smtp(&config, &reply))
            .await
            .map_err(|reason| ChannelError::SendFailed {
                name: "imap".into(),
                reason,
            })?;
        info!(to = %to, "Email sent");
        Ok(())
    }

    async fn draft(&self, reply: &OutgoingReply) -> Result<(), ChannelError> {
        let message = build_reply(&self.config.from_address, reply).map_err(|reason| {
            ChannelError::DraftFailed {
                name: "imap".into(),
                reason,
            }
        })?;
        let bytes = message.formatted();
        self.blocking(move |config| append_draft(&config, &bytes))
            .await
            .map_err(|reason| ChannelError::DraftFailed {
                name: "imap".into(),
                reason,
            })?;
        info!(to = %reply.to, mailbox = %self.config.drafts_mailbox, "Draft saved");
        Ok(())
    }

    async fn add_label(&self, thread: &MailThread, label: &str) -> Result<(), ChannelError> {
        let uids: Vec<String> = thread.messages.iter().map(|m| m.id.clone()).collect();
        if uids.is_empty() {
            return Ok(());
        }
        let flag = keyword_flag(label);
        if flag != label {
            warn!(label, flag = %flag, "Label is not a valid IMAP keyword, storing sanitized form");
        }
        self.blocking(move |config| store_keyword(&config, &uids, &flag))
            .await
            .map_err(|reason| ChannelError::LabelFailed {
                name: "imap".into(),
                thread_id: thread.id.clone(),
                reason,
            })
    }
}

// ── SMTP ────────────────────────────────────────────────────────────

/// Build the outgoing message, with the attachment as a second MIME part.
pub fn build_reply(from: &str, reply: &OutgoingReply) -> Result<Message, String> {
    let builder = Message::builder()
        .from(
            from.parse::<lettre::message::Mailbox>()
                .map_err(|e| format!("Invalid from address: {e}"))?,
        )
        .to(reply
            .to
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| format!("Invalid to address: {e}"))?)
        .subject(reply.subject.clone());

    let built = match &reply.attachment {
        Some(doc) => {
            let content_type = ContentType::parse(doc.content_type())
                .map_err(|e| format!("Invalid attachment type: {e}"))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(reply.body.clone()))
                    .singlepart(
                        Attachment::new(doc.filename.clone()).body(doc.bytes.clone(), content_type),
                    ),
            )
        }
        None => builder.body(reply.body.clone()),
    };
    built.map_err(|e| format!("Failed to build email: {e}"))
}

fn send_smtp(config: &EmailConfig, reply: &OutgoingReply) -> Result<(), ImapError> {
    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let relay = if config.smtp_port == 465 {
        SmtpTransport::relay(&config.smtp_host)
    } else {
        SmtpTransport::starttls_relay(&config.smtp_host)
    };
    let transport = relay
        .map_err(|e| format!("SMTP relay error: {e}"))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    let email = build_reply(&config.from_address, reply)?;
    transport
        .send(&email)
        .map_err(|e| format!("SMTP send failed: {e}"))?;
    Ok(())
}

// ── IMAP ────────────────────────────────────────────────────────────

type ImapError = Box<dyn std::error::Error + Send + Sync>;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// One untagged response; literal payloads are split out of `text`.
#[derive(Debug, Default)]
struct Untagged {
    text: String,
    literals: Vec<Vec<u8>>,
}

/// Minimal blocking IMAP4rev1 client session.
struct ImapSession {
    stream: BufReader<TlsStream>,
    next_tag: u32,
}

impl ImapSession {
    /// Connect, read the greeting, log in, and select `mailbox`.
    fn open(config: &EmailConfig, mailbox: &str) -> Result<Self, ImapError> {
        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))?;
        tcp.set_read_timeout(Some(Duration::from_secs(IMAP_READ_TIMEOUT_SECS)))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)?;

        let mut session = Self {
            stream: BufReader::new(rustls::StreamOwned::new(conn, tcp)),
            next_tag: 1,
        };
        let _greeting = session.read_response()?;

        session
            .command(&format!(
                "LOGIN {} {}",
                imap_quote(&config.username),
                imap_quote(config.password.expose_secret())
            ))
            .map_err(|e| format!("IMAP login failed: {e}"))?;
        session.command(&format!("SELECT {}", imap_quote(mailbox)))?;
        Ok(session)
    }

    fn tag(&mut self) -> String {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;
        tag
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ImapError> {
        let stream = self.stream.get_mut();
        IoWrite::write_all(stream, bytes)?;
        IoWrite::flush(stream)?;
        Ok(())
    }

    /// Run a command and collect its untagged responses. Fails unless the
    /// tagged completion is `OK`.
    fn command(&mut self, cmd: &str) -> Result<Vec<Untagged>, ImapError> {
        let tag = self.tag();
        self.write(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.read_until_tagged(&tag)
    }

    /// `APPEND` with a synchronizing literal.
    fn append(&mut self, mailbox: &str, flags: &str, message: &[u8]) -> Result<(), ImapError> {
        let tag = self.tag();
        self.write(
            format!(
                "{tag} APPEND {} ({flags}) {{{}}}\r\n",
                imap_quote(mailbox),
                message.len()
            )
            .as_bytes(),
        )?;

        loop {
            let resp = self.read_response()?;
            if resp.text.starts_with('+') {
                break;
            }
            if resp.text.starts_with(&format!("{tag} ")) {
                return Err(format!("APPEND refused: {}", resp.text.trim()).into());
            }
        }

        self.write(message)?;
        self.write(b"\r\n")?;
        self.read_until_tagged(&tag)?;
        Ok(())
    }

    fn logout(mut self) {
        if let Err(e) = self.command("LOGOUT") {
            debug!(error = %e, "IMAP logout did not complete cleanly");
        }
    }

    fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Untagged>, ImapError> {
        let prefix = format!("{tag} ");
        let mut untagged = Vec::new();
        loop {
            let resp = self.read_response()?;
            if let Some(status) = resp.text.strip_prefix(&prefix) {
                if status.starts_with("OK") {
                    return Ok(untagged);
                }
                return Err(status.trim().to_string().into());
            }
            untagged.push(resp);
        }
    }

    /// One logical response line, reading through any `{n}` literals.
    fn read_response(&mut self) -> Result<Untagged, ImapError> {
        let mut resp = Untagged::default();
        loop {
            let mut line = Vec::new();
            let n = self.stream.read_until(b'\n', &mut line)?;
            if n == 0 {
                return Err("IMAP connection closed".into());
            }
            let text = String::from_utf8_lossy(&line);
            resp.text.push_str(&text);

            match literal_len(&text) {
                Some(len) => {
                    let mut literal = vec![0u8; len];
                    self.stream.read_exact(&mut literal)?;
                    resp.literals.push(literal);
                }
                None => return Ok(resp),
            }
        }
    }
}

/// Length of a literal announced at the end of `line` (`... {123}\r\n`).
fn literal_len(line: &str) -> Option<usize> {
    let line = line.trim_end_matches(['\r', '\n']);
    let inner = line.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].parse().ok()
}

fn fetch_recent(config: &EmailConfig, days: u32) -> Result<Vec<FetchedMessage>, ImapError> {
    let mut session = ImapSession::open(config, &config.inbox)?;

    let since = since_date(Utc::now(), days);
    let uids: Vec<String> = session
        .command(&format!("UID SEARCH SINCE {since}"))?
        .iter()
        .flat_map(|r| parse_search(&r.text))
        .collect();

    let mut fetched = Vec::new();
    if !uids.is_empty() {
        let responses =
            session.command(&format!("UID FETCH {} (UID FLAGS BODY.PEEK[])", uids.join(",")))?;
        for resp in &responses {
            let Some(raw) = resp.literals.first() else {
                continue;
            };
            match parse_fetch(&resp.text, raw) {
                Some(message) => fetched.push(message),
                None => warn!(response = %resp.text.trim(), "Skipping unparseable FETCH response"),
            }
        }
    }

    session.logout();
    Ok(fetched)
}

fn store_keyword(config: &EmailConfig, uids: &[String], flag: &str) -> Result<(), ImapError> {
    let mut session = ImapSession::open(config, &config.inbox)?;
    session.command(&format!("UID STORE {} +FLAGS.SILENT ({flag})", uids.join(",")))?;
    session.logout();
    Ok(())
}

fn append_draft(config: &EmailConfig, message: &[u8]) -> Result<(), ImapError> {
    let mut session = ImapSession::open(config, &config.drafts_mailbox)?;
    session.append(&config.drafts_mailbox, "\\Draft \\Seen", message)?;
    session.logout();
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
