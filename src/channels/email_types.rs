//! Email-specific helpers: reply threading, subject prefixing, raw header
//! extraction, quote stripping, HTML rendering.
//!
//! Pure string processing; no I/O.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::{InboundMessage, OutboundReply};

static RE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*re\s*:\s*").unwrap());
static RE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());
static RE_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+?)\*|\b_([^_\n]+?)_\b").unwrap());

// ── Threading ───────────────────────────────────────────────────────

/// `"Re: "` + the subject with any existing `Re:` prefixes removed.
pub fn reply_subject(subject: &str) -> String {
    let mut rest = subject.trim();
    while let Some(m) = RE_PREFIX.find(rest) {
        rest = rest[m.end()..].trim_start();
    }
    if rest.is_empty() {
        "Re: (no subject)".to_string()
    } else {
        format!("Re: {rest}")
    }
}

/// Incoming `References` ids followed by the triggering message id.
pub fn reply_references(references_header: Option<&str>, message_id: &str) -> Vec<String> {
    let mut refs: Vec<String> = references_header
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if refs.last().map(String::as_str) != Some(message_id) {
        refs.push(message_id.to_string());
    }
    refs
}

/// Build the threaded reply to `message`.
pub fn build_reply(message: &InboundMessage, body_text: String) -> OutboundReply {
    OutboundReply {
        to: message.sender_address.clone(),
        in_reply_to: message.message_id.clone(),
        references: reply_references(message.references_header.as_deref(), &message.message_id),
        subject: reply_subject(&message.subject),
        body_text,
    }
}

// ── Raw headers ─────────────────────────────────────────────────────

/// Value of header `name` from a raw RFC 5322 message, unfolded and trimmed.
///
/// Used for `Message-ID`, `References` and `In-Reply-To`, which must be
/// reused verbatim rather than re-rendered by the parser.
pub fn raw_header(raw: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut value: Option<String> = None;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(v) = value.as_mut() {
                v.push(' ');
                v.push_str(line.trim());
            }
            continue;
        }
        if value.is_some() {
            break;
        }
        if let Some((key, rest)) = line.split_once(':')
            && key.trim().eq_ignore_ascii_case(name)
        {
            value = Some(rest.trim().to_string());
        }
    }

    value.filter(|v| !v.is_empty())
}

// ── Body text ───────────────────────────────────────────────────────

/// Strip quoted text from an email body.
///
/// Removes:
/// - Lines starting with `>` (quoted reply lines)
/// - Everything after an "On ... wrote:" attribution line
/// - Everything after an "Original Message" separator
pub fn strip_quoted_text(body: &str) -> String {
    let mut result = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('>') {
            continue;
        }

        if trimmed.starts_with("On ") && trimmed.ends_with("wrote:") {
            break;
        }

        if trimmed.starts_with("---") && trimmed.contains("Original Message") {
            break;
        }

        result.push(line);
    }

    while result.last().is_some_and(|l| l.trim().is_empty()) {
        result.pop();
    }

    result.join("\n")
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── HTML rendering ──────────────────────────────────────────────────

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render a plain-text reply as simple HTML.
///
/// Paragraphs split on blank lines, single newlines become `<br>`, and
/// `**bold**` / `*italic*` markdown is converted.
pub fn render_html(body: &str) -> String {
    let paragraphs: Vec<String> = body
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let escaped = escape_html(p);
            let bold = RE_BOLD.replace_all(&escaped, |c: &regex::Captures| {
                let inner = c.get(1).or_else(|| c.get(2)).map_or("", |m| m.as_str());
                format!("<strong>{inner}</strong>")
            });
            let italic = RE_ITALIC.replace_all(&bold, |c: &regex::Captures| {
                let inner = c.get(1).or_else(|| c.get(2)).map_or("", |m| m.as_str());
                format!("<em>{inner}</em>")
            });
            format!("<p>{}</p>", italic.replace('\n', "<br>\n"))
        })
        .collect();

    format!(
        "<html>\n<body style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333;\">\n{}\n</body>\n</html>",
        paragraphs.join("\n")
    )
}
