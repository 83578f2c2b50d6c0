//! Spam and security filter.
//!
//! Runs before categorization. Each heuristic adds a weighted amount to a
//! score capped at 1.0; a score at or above the configured threshold is spam.
//! Automated senders and payment-processor notices are always rejected,
//! whatever their score.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::debug;

use crate::channels::email_types::strip_quoted_text;
use crate::pipeline::types::{InboundMessage, SpamVerdict};

const NO_REPLY_WEIGHT: f64 = 0.3;
const SUSPICIOUS_SENDER_WEIGHT: f64 = 0.5;
const TRIGGER_PHRASE_WEIGHT: f64 = 0.1;
const TRIGGER_PHRASE_CAP: f64 = 0.5;
const CAPS_WEIGHT: f64 = 0.2;
const ATTACHMENT_WEIGHT: f64 = 0.3;
const SHORTENER_WEIGHT: f64 = 0.2;
const LINK_FLOOD_WEIGHT: f64 = 0.2;
const EMPTY_BODY_WEIGHT: f64 = 0.2;

/// More links than this counts as a link flood.
const MAX_LINKS: usize = 5;
/// Bodies with fewer non-whitespace characters count as empty.
const MIN_BODY_CHARS: usize = 5;
/// Subjects with fewer letters are too short to judge capitalisation.
const MIN_CAPS_LETTERS: usize = 8;

/// Longest body passed on to generation.
pub const MAX_BODY_CHARS: usize = 5000;

/// Known spam trigger phrases, matched on word boundaries.
const TRIGGER_PHRASES: &[&str] = &[
    // financial scams
    "lottery",
    "winner",
    "million dollars",
    "inheritance",
    "bitcoin",
    "investment opportunity",
    "claim your",
    "free money",
    "jackpot",
    "casino",
    "get rich",
    "earn money fast",
    "prize winner",
    // finnish
    "voita",
    "arvonta",
    "kilpailu",
    "ilmainen",
    "voittaja",
    // urgency
    "act now",
    "limited time",
    "expires today",
    "urgent action required",
    // phishing
    "verify your account",
    "suspended account",
    "click here immediately",
    "confirm your identity",
    "update payment information",
    // adult
    "xxx",
    "adult",
    "singles",
    "dating",
    // pharma
    "viagra",
    "cialis",
    "pharmacy",
    "pills",
    "medication",
];

/// Legitimate domains that look-alike patterns must not flag.
const WHITELIST_DOMAINS: &[&str] = &[
    "paypal.com",
    "amazon.com",
    "amazon.co.uk",
    "ebay.com",
    "google.com",
    "microsoft.com",
    "apple.com",
    "facebook.com",
    "linkedin.com",
];

/// Spam filter with compiled patterns.
pub struct SpamFilter {
    threshold: f64,
    no_reply: Regex,
    suspicious_sender: Regex,
    trigger_phrases: Regex,
    attachment: Regex,
    shortener: Regex,
    url: Regex,
    payment_subject: Regex,
    payment_sender: Regex,
}

impl SpamFilter {
    pub fn new(threshold: f64) -> Self {
        let phrases = TRIGGER_PHRASES
            .iter()
            .map(|p| regex::escape(p).replace(' ', r"\s+"))
            .collect::<Vec<_>>()
            .join("|");

        Self {
            threshold,
            no_reply: Regex::new(
                r"(?i)^(no[\-_.]?reply|do[\-_.]?not[\-_.]?reply|notifications?|alerts?|automated|system|mailer[\-_]?daemon|postmaster)@",
            )
            .unwrap(),
            suspicious_sender: Regex::new(
                r"(?i)(@(.*[.\-])?(paypal|banking|amazon|ebay|lottery|winner|prize|kilpailu|arvonta)\.|voita@)",
            )
            .unwrap(),
            trigger_phrases: Regex::new(&format!(r"(?i)\b(?:{phrases})\b")).unwrap(),
            attachment: Regex::new(r"(?i)\w\.(exe|zip|rar|bat|cmd|scr)\b").unwrap(),
            shortener: Regex::new(r"(?i)\b(bit\.ly|tinyurl\.com|goo\.gl|ow\.ly|t\.co)/").unwrap(),
            url: Regex::new(r"https?://[^\s<>]+").unwrap(),
            payment_subject: Regex::new(r"(?i)\b(receipt|payment|invoice|transaction)s?\b").unwrap(),
            payment_sender: Regex::new(r"(?i)(paypal|stripe|square|venmo)").unwrap(),
        }
    }

    /// Automated sender that must never get a reply.
    pub fn is_no_reply(&self, address: &str) -> bool {
        self.no_reply.is_match(address.trim())
    }

    fn is_whitelisted(address: &str) -> bool {
        let Some((_, domain)) = address.rsplit_once('@') else {
            return false;
        };
        let domain = domain.trim().to_lowercase();
        WHITELIST_DOMAINS
            .iter()
            .any(|w| domain == *w || domain.ends_with(&format!(".{w}")))
    }

    /// Score `message` and decide whether it is spam.
    pub fn evaluate(&self, message: &InboundMessage) -> SpamVerdict {
        let sender = message.sender_address.trim();
        let subject = message.subject.as_str();
        let body = message.body_text.as_str();

        let mut score = 0.0;
        let mut reasons = Vec::new();
        let mut forced = false;

        if self.is_no_reply(sender) {
            score += NO_REPLY_WEIGHT;
            forced = true;
            reasons.push("automated sender".to_string());
        }

        if self.suspicious_sender.is_match(sender) && !Self::is_whitelisted(sender) {
            score += SUSPICIOUS_SENDER_WEIGHT;
            reasons.push("suspicious sender domain".to_string());
        }

        let haystack = format!("{subject}\n{body}");
        let found: BTreeSet<String> = self
            .trigger_phrases
            .find_iter(&haystack)
            .map(|m| m.as_str().to_lowercase())
            .collect();
        if !found.is_empty() {
            score += (found.len() as f64 * TRIGGER_PHRASE_WEIGHT).min(TRIGGER_PHRASE_CAP);
            let listed: Vec<&str> = found.iter().take(5).map(String::as_str).collect();
            reasons.push(format!("trigger phrases: {}", listed.join(", ")));
        }

        let letters: Vec<char> = subject.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() >= MIN_CAPS_LETTERS {
            let upper = letters.iter().filter(|c| c.is_uppercase()).count();
            if upper as f64 / letters.len() as f64 > 0.5 {
                score += CAPS_WEIGHT;
                reasons.push("excessive capitalisation".to_string());
            }
        }

        let extensions: BTreeSet<String> = self
            .attachment
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_lowercase()))
            .collect();
        for ext in &extensions {
            score += ATTACHMENT_WEIGHT;
            reasons.push(format!("suspicious attachment type: .{ext}"));
        }

        let shorteners: BTreeSet<String> = self
            .shortener
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_lowercase()))
            .collect();
        for s in &shorteners {
            score += SHORTENER_WEIGHT;
            reasons.push(format!("URL shortener: {s}"));
        }

        let links = self.url.find_iter(body).count();
        if links > MAX_LINKS {
            score += LINK_FLOOD_WEIGHT;
            reasons.push(format!("{links} links"));
        }

        if body.chars().filter(|c| !c.is_whitespace()).count() < MIN_BODY_CHARS {
            score += EMPTY_BODY_WEIGHT;
            reasons.push("empty body".to_string());
        }

        if self.payment_subject.is_match(subject) && self.payment_sender.is_match(sender) {
            forced = true;
            reasons.push("payment processor notice".to_string());
        }

        let score: f64 = f64::min(score, 1.0);
        let is_spam = forced || score >= self.threshold;
        if is_spam {
            debug!(sender, score, reasons = ?reasons, "Message flagged as spam");
        }

        SpamVerdict {
            score,
            is_spam,
            reasons,
        }
    }

    /// Body text safe to put in a prompt: quoted history dropped, links
    /// removed, length capped.
    pub fn sanitize_body(&self, body: &str) -> String {
        let stripped = strip_quoted_text(body);
        let cleaned = self.url.replace_all(&stripped, "[URL REMOVED]");
        if cleaned.chars().count() > MAX_BODY_CHARS {
            let truncated: String = cleaned.chars().take(MAX_BODY_CHARS).collect();
            format!("{truncated}... [TRUNCATED]")
        } else {
            cleaned.into_owned()
        }
    }
}
