//! Shared types for the message processing pipeline.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MailError;

// ── Inbound message ─────────────────────────────────────────────────

/// A message fetched from the mailbox. Never mutated after fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Mailbox UID, used to flag the message `\Seen` once handled.
    pub uid: String,
    /// Raw `Message-ID` header, angle brackets included.
    pub message_id: String,
    /// Bare sender address.
    pub sender_address: String,
    /// Display name from the `From` header, if any.
    pub sender_name: Option<String>,
    pub subject: String,
    pub body_text: String,
    pub received_at: DateTime<Utc>,
    /// Raw `References` header, verbatim.
    pub references_header: Option<String>,
    /// Raw `In-Reply-To` header, verbatim.
    pub in_reply_to_header: Option<String>,
}

impl InboundMessage {
    /// Name to greet the sender by: display name, else the local part.
    pub fn greeting_name(&self) -> &str {
        match &self.sender_name {
            Some(name) if !name.trim().is_empty() => name.trim(),
            _ => self
                .sender_address
                .split('@')
                .next()
                .unwrap_or(&self.sender_address),
        }
    }
}

// ── Outbound reply ──────────────────────────────────────────────────

/// A reply ready to hand to the SMTP sender. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub to: String,
    /// The triggering message's id.
    pub in_reply_to: String,
    /// Prior ids in thread order, ending with `in_reply_to`.
    pub references: Vec<String>,
    pub subject: String,
    pub body_text: String,
}

impl OutboundReply {
    /// `References` header value.
    pub fn references_header(&self) -> String {
        self.references.join(" ")
    }
}

// ── Category ────────────────────────────────────────────────────────

/// Closed set of message categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Complaint,
    ProductSupport,
    FeatureRequest,
    BillingQuestion,
    GeneralFeedback,
    UrgentRequest,
    Spam,
    CustomerInquiry,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Complaint,
        Category::ProductSupport,
        Category::FeatureRequest,
        Category::BillingQuestion,
        Category::GeneralFeedback,
        Category::UrgentRequest,
        Category::Spam,
        Category::CustomerInquiry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complaint => "complaint",
            Self::ProductSupport => "product_support",
            Self::FeatureRequest => "feature_request",
            Self::BillingQuestion => "billing_question",
            Self::GeneralFeedback => "general_feedback",
            Self::UrgentRequest => "urgent_request",
            Self::Spam => "spam",
            Self::CustomerInquiry => "customer_inquiry",
        }
    }

    /// Parse an untrusted label (e.g. model output). Anything outside the
    /// enumeration becomes `CustomerInquiry`.
    pub fn from_label_or_default(label: &str) -> Self {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        normalized
            .trim_matches('_')
            .parse()
            .unwrap_or(Self::CustomerInquiry)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

// ── Analysis ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Categorizer output for a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analysis {
    pub category: Category,
    pub sentiment: Sentiment,
    pub priority: Priority,
}

/// Spam filter output.
#[derive(Debug, Clone, PartialEq)]
pub struct SpamVerdict {
    /// Weighted score in `[0, 1]`.
    pub score: f64,
    pub is_spam: bool,
    /// Signals that contributed to the score.
    pub reasons: Vec<String>,
}

// ── Processing outcome ──────────────────────────────────────────────

/// Why a message was not answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already in the tracker.
    Duplicate,
    /// Spam filter or spam category.
    Spam,
    /// Sender at the per-window ceiling.
    RateLimited,
    /// Sent from our own mailbox.
    OwnAddress,
    /// The reply was permanently rejected (bad address, 5xx).
    Undeliverable,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Spam => "spam",
            Self::RateLimited => "rate_limited",
            Self::OwnAddress => "own_address",
            Self::Undeliverable => "undeliverable",
        }
    }
}

/// Terminal state of one message in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Reply sent and recorded.
    Replied {
        category: Category,
        /// The fallback template was used instead of a generated reply.
        fallback: bool,
    },
    /// Deliberately not answered.
    Skipped(SkipReason),
    /// Left unrecorded; retried next cycle.
    Deferred { reason: String },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Replied { fallback: false, .. } => "replied",
            Self::Replied { fallback: true, .. } => "replied_fallback",
            Self::Skipped(reason) => reason.label(),
            Self::Deferred { .. } => "deferred",
        }
    }
}

// ── Mailbox collaborators ───────────────────────────────────────────

/// Reads candidate messages from the mailbox.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Unread messages received at or after `since`, newest first, at most `limit`.
    async fn fetch(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, MailError>;

    /// Flag a handled message so it is not fetched again.
    async fn acknowledge(&self, message: &InboundMessage) -> Result<(), MailError>;

    /// Check that the mailbox accepts our credentials.
    async fn verify(&self) -> Result<(), MailError>;
}

/// Sends replies.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send `reply`, attaching an HTML alternative when `html` is set.
    async fn send(&self, reply: &OutboundReply, html: bool) -> Result<(), MailError>;
}
