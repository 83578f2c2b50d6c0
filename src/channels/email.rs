//! Email channel: raw IMAP over rustls for reading, SMTP via lettre for
//! sending.
//!
//! All socket I/O is blocking and runs on the blocking pool; each call is
//! awaited before the pipeline moves on.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::{Mailbox, MultiPart, SinglePart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::MessageParser;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::email_types::{raw_header, render_html, strip_html};
use crate::error::MailError;
use crate::pipeline::types::{InboundMessage, MailSender, MailSource, OutboundReply};

/// Socket read/write timeout for IMAP and SMTP.
const IO_TIMEOUT: Duration = Duration::from_secs(30);

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox connection settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Mailbox address; also the login name and the reply `From`.
    pub address: String,
    pub password: SecretString,
}

// ── IMAP session ────────────────────────────────────────────────────

/// One tagged command's response.
#[derive(Debug, Default)]
struct ImapResponse {
    /// Untagged lines, CRLF stripped.
    untagged: Vec<String>,
    /// `{N}` literal payloads in arrival order.
    literals: Vec<Vec<u8>>,
    /// Tagged completion line, CRLF stripped.
    status: String,
}

impl ImapResponse {
    fn is_ok(&self) -> bool {
        self.status
            .split_whitespace()
            .nth(1)
            .is_some_and(|s| s.eq_ignore_ascii_case("OK"))
    }
}

/// Minimal IMAP4rev1 client over any byte stream.
pub struct ImapSession<S: Read + Write> {
    stream: S,
    server: String,
    next_tag: u32,
}

impl<S: Read + Write> ImapSession<S> {
    /// Wrap a connected stream and consume the server greeting.
    pub fn open(stream: S, server: &str) -> Result<Self, MailError> {
        let mut session = Self {
            stream,
            server: server.to_string(),
            next_tag: 1,
        };
        let greeting = session.read_line()?;
        let greeting = String::from_utf8_lossy(&greeting);
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(MailError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }
        Ok(session)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, MailError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => {
                    return Err(MailError::Connection {
                        server: self.server.clone(),
                        reason: "IMAP connection closed".into(),
                    });
                }
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(buf);
                    }
                }
                Err(e) => return Err(MailError::from_io(&self.server, e)),
            }
        }
    }

    fn command(&mut self, cmd: &str) -> Result<ImapResponse, MailError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        let full = format!("{tag} {cmd}\r\n");
        self.stream
            .write_all(full.as_bytes())
            .and_then(|()| self.stream.flush())
            .map_err(|e| MailError::from_io(&self.server, e))?;

        let mut response = ImapResponse::default();
        let tag_prefix = format!("{tag} ");
        loop {
            let raw = self.read_line()?;
            let line = String::from_utf8_lossy(&raw).trim_end().to_string();
            if line.starts_with(&tag_prefix) {
                response.status = line;
                return Ok(response);
            }
            if let Some(len) = literal_len(&line) {
                let mut literal = vec![0u8; len];
                self.stream
                    .read_exact(&mut literal)
                    .map_err(|e| MailError::from_io(&self.server, e))?;
                response.literals.push(literal);
            }
            response.untagged.push(line);
        }
    }

    fn expect_ok(&mut self, cmd: &str) -> Result<ImapResponse, MailError> {
        let response = self.command(cmd)?;
        if response.is_ok() {
            Ok(response)
        } else {
            Err(MailError::Protocol(response.status))
        }
    }

    pub fn login(&mut self, user: &str, password: &str) -> Result<(), MailError> {
        let response = self.command(&format!(
            "LOGIN {} {}",
            quote(user),
            quote(password)
        ))?;
        if response.is_ok() {
            Ok(())
        } else {
            Err(MailError::AuthFailed {
                server: self.server.clone(),
                reason: response.status,
            })
        }
    }

    pub fn select_inbox(&mut self) -> Result<(), MailError> {
        self.expect_ok("SELECT \"INBOX\"").map(|_| ())
    }

    /// UIDs of unread messages with an internal date on or after `since`.
    pub fn search_unseen_since(&mut self, since: DateTime<Utc>) -> Result<Vec<u32>, MailError> {
        let date = since.format("%d-%b-%Y");
        let response = self.expect_ok(&format!("UID SEARCH UNSEEN SINCE {date}"))?;
        let mut uids: Vec<u32> = response
            .untagged
            .iter()
            .filter_map(|line| line.strip_prefix("* SEARCH"))
            .flat_map(|rest| rest.split_whitespace())
            .filter_map(|n| n.parse().ok())
            .collect();
        uids.sort_unstable();
        Ok(uids)
    }

    /// Full raw message, fetched without setting `\Seen`.
    pub fn fetch_raw(&mut self, uid: u32) -> Result<Option<Vec<u8>>, MailError> {
        let mut response = self.expect_ok(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
        Ok(response.literals.pop())
    }

    pub fn mark_seen(&mut self, uid: &str) -> Result<(), MailError> {
        self.expect_ok(&format!("UID STORE {uid} +FLAGS (\\Seen)"))
            .map(|_| ())
    }

    pub fn logout(&mut self) {
        if let Err(e) = self.command("LOGOUT") {
            debug!(error = %e, "IMAP logout failed");
        }
    }
}

/// IMAP quoted string.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Length of a `{N}` literal announced at the end of `line`.
fn literal_len(line: &str) -> Option<usize> {
    let body = line.strip_suffix('}')?;
    let open = body.rfind('{')?;
    body[open + 1..].trim_end_matches('+').parse().ok()
}

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Connect, negotiate TLS and log in.
fn connect_imap(config: &EmailConfig) -> Result<ImapSession<TlsStream>, MailError> {
    let server = format!("{}:{}", config.imap_host, config.imap_port);
    let conn_err = |reason: String| MailError::Connection {
        server: server.clone(),
        reason,
    };

    let addr = (config.imap_host.as_str(), config.imap_port)
        .to_socket_addrs()
        .map_err(|e| conn_err(format!("DNS lookup failed: {e}")))?
        .next()
        .ok_or_else(|| conn_err("no address resolved".into()))?;

    let tcp = TcpStream::connect_timeout(&addr, IO_TIMEOUT)
        .map_err(|e| MailError::from_io(&server, e))?;
    tcp.set_read_timeout(Some(IO_TIMEOUT))
        .and_then(|()| tcp.set_write_timeout(Some(IO_TIMEOUT)))
        .map_err(|e| MailError::from_io(&server, e))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())
        .map_err(|e| conn_err(format!("invalid server name: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| conn_err(format!("TLS setup failed: {e}")))?;

    let mut session = ImapSession::open(rustls::StreamOwned::new(conn, tcp), &server)?;
    session.login(&config.address, config.password.expose_secret())?;
    Ok(session)
}

// ── Parsing ─────────────────────────────────────────────────────────

/// Turn a raw RFC 5322 message into an [`InboundMessage`].
pub fn parse_message(uid: &str, raw: &[u8]) -> Option<InboundMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let from = parsed.from().and_then(|addr| addr.first());
    let sender_address = from.and_then(|a| a.address())?.trim().to_string();
    let sender_name = from
        .and_then(|a| a.name())
        .map(|n| n.trim().trim_matches('"').to_string())
        .filter(|n| !n.is_empty());

    let body_text = if let Some(text) = parsed.body_text(0) {
        text.to_string()
    } else if let Some(html) = parsed.body_html(0) {
        strip_html(html.as_ref())
    } else {
        String::new()
    };

    let message_id = raw_header(raw, "Message-ID")
        .or_else(|| parsed.message_id().map(|id| format!("<{id}>")))
        .unwrap_or_else(|| format!("<gen-{}@inbox-responder>", Uuid::new_v4()));

    let received_at = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    Some(InboundMessage {
        uid: uid.to_string(),
        message_id,
        sender_address,
        sender_name,
        subject: parsed.subject().unwrap_or_default().trim().to_string(),
        body_text,
        received_at,
        references_header: raw_header(raw, "References"),
        in_reply_to_header: raw_header(raw, "In-Reply-To"),
    })
}

/// Newest-first fetch over an open, selected session.
fn fetch_from_session<S: Read + Write>(
    session: &mut ImapSession<S>,
    since: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<InboundMessage>, MailError> {
    let uids = session.search_unseen_since(since)?;
    debug!(candidates = uids.len(), "Unread messages in window");

    let mut messages = Vec::new();
    for uid in uids.into_iter().rev() {
        if messages.len() >= limit {
            break;
        }
        let Some(raw) = session.fetch_raw(uid)? else {
            warn!(uid, "FETCH returned no body");
            continue;
        };
        match parse_message(&uid.to_string(), &raw) {
            Some(msg) if msg.received_at >= since => messages.push(msg),
            Some(msg) => {
                debug!(uid, received_at = %msg.received_at, "Outside look-back window");
            }
            None => warn!(uid, "Unparseable message skipped"),
        }
    }
    Ok(messages)
}

// ── SMTP ────────────────────────────────────────────────────────────

fn build_message(from: &str, reply: &OutboundReply, html: bool) -> Result<Message, MailError> {
    let from: Mailbox = from.parse().map_err(|e| MailError::InvalidAddress {
        address: from.to_string(),
        reason: format!("{e}"),
    })?;
    let to: Mailbox = reply.to.parse().map_err(|e| MailError::InvalidAddress {
        address: reply.to.clone(),
        reason: format!("{e}"),
    })?;

    let builder = Message::builder()
        .from(from)
        .to(to)
        .subject(reply.subject.clone())
        .in_reply_to(reply.in_reply_to.clone())
        .references(reply.references_header());

    let message = if html {
        builder.multipart(MultiPart::alternative_plain_html(
            reply.body_text.clone(),
            render_html(&reply.body_text),
        ))
    } else {
        builder.singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(reply.body_text.clone()),
        )
    };
    message.map_err(|e| MailError::Build(e.to_string()))
}

fn classify_smtp_error(server: &str, to: &str, e: lettre::transport::smtp::Error) -> MailError {
    let text = e.to_string();
    if e.is_timeout() {
        MailError::Timeout {
            server: server.to_string(),
        }
    } else if text.contains("535") || text.to_lowercase().contains("authentication") {
        MailError::AuthFailed {
            server: server.to_string(),
            reason: text,
        }
    } else if e.is_permanent() {
        MailError::Rejected {
            to: to.to_string(),
            reason: text,
        }
    } else {
        MailError::SendFailed {
            to: to.to_string(),
            reason: text,
        }
    }
}

// ── Channel ─────────────────────────────────────────────────────────

/// IMAP (inbound) + SMTP (outbound) mailbox channel.
pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn send_blocking(config: &EmailConfig, reply: &OutboundReply, html: bool) -> Result<(), MailError> {
        let server = format!("{}:{}", config.smtp_host, config.smtp_port);
        let email = build_message(&config.address, reply, html)?;

        let creds = Credentials::new(
            config.address.clone(),
            config.password.expose_secret().to_string(),
        );
        let builder = if config.smtp_port == 465 {
            SmtpTransport::relay(&config.smtp_host)
        } else {
            SmtpTransport::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| MailError::Connection {
            server: server.clone(),
            reason: format!("SMTP relay error: {e}"),
        })?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(creds)
            .timeout(Some(IO_TIMEOUT))
            .build();

        transport
            .send(&email)
            .map_err(|e| classify_smtp_error(&server, &reply.to, e))?;
        Ok(())
    }
}

fn join_error(server: &str, e: tokio::task::JoinError) -> MailError {
    MailError::Connection {
        server: server.to_string(),
        reason: format!("mail task failed: {e}"),
    }
}

#[async_trait]
impl MailSource for EmailChannel {
    async fn fetch(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, MailError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = connect_imap(&cfg)?;
            session.select_inbox()?;
            let result = fetch_from_session(&mut session, since, limit);
            session.logout();
            result
        })
        .await
        .map_err(|e| join_error(&self.config.imap_host, e))?
    }

    async fn acknowledge(&self, message: &InboundMessage) -> Result<(), MailError> {
        let cfg = self.config.clone();
        let uid = message.uid.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = connect_imap(&cfg)?;
            session.select_inbox()?;
            let result = session.mark_seen(&uid);
            session.logout();
            result
        })
        .await
        .map_err(|e| join_error(&self.config.imap_host, e))?
    }

    async fn verify(&self) -> Result<(), MailError> {
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = connect_imap(&cfg)?;
            session.logout();
            Ok(())
        })
        .await
        .map_err(|e| join_error(&self.config.imap_host, e))??;
        info!(server = %self.config.imap_host, "Mailbox login verified");
        Ok(())
    }
}

#[async_trait]
impl MailSender for EmailChannel {
    async fn send(&self, reply: &OutboundReply, html: bool) -> Result<(), MailError> {
        let cfg = self.config.clone();
        let owned = reply.clone();
        tokio::task::spawn_blocking(move || Self::send_blocking(&cfg, &owned, html))
            .await
            .map_err(|e| join_error(&self.config.smtp_host, e))??;
        debug!(to = %reply.to, "SMTP accepted message");
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
