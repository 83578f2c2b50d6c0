//! Email categorizer.
//!
//! Keyword rules are always available and deterministic. When AI
//! classification is enabled the model is asked for a label first; its
//! answer is validated against [`Category`] and any failure falls back to
//! the rules.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{Analysis, Category, InboundMessage, Priority, Sentiment};

const CLASSIFY_MAX_TOKENS: u32 = 16;
const CLASSIFY_TEMPERATURE: f32 = 0.0;
/// Characters of body text sent for classification.
const CLASSIFY_BODY_CHARS: usize = 1500;

/// Keyword sets in priority order. The first set that matches wins.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Spam,
        &[
            "lottery",
            "million dollars",
            "bitcoin",
            "investment opportunity",
            "inheritance",
            "claim your",
            "free money",
            "winner",
            "jackpot",
            "casino",
            "earn money fast",
            "get rich",
        ],
    ),
    (
        Category::Complaint,
        &[
            "complaint",
            "disappointed",
            "unhappy",
            "terrible",
            "awful",
            "poor",
            "unsatisfied",
            "frustrated",
            "upset",
            "angry",
            "annoyed",
            "dissatisfied",
            "unacceptable",
            "bad experience",
            "bad service",
            "poor quality",
            "does not work at all",
        ],
    ),
    (
        Category::UrgentRequest,
        &[
            "urgent",
            "emergency",
            "asap",
            "immediate",
            "immediately",
            "critical",
            "time sensitive",
            "deadline",
            "rush",
            "as soon as possible",
            "promptly",
        ],
    ),
    (
        Category::BillingQuestion,
        &[
            "bill",
            "billing",
            "billed",
            "charge",
            "charged",
            "payment",
            "refund",
            "subscription",
            "price",
            "pricing",
            "cost",
            "discount",
            "invoice",
            "credit card",
            "transaction",
            "receipt",
            "cancellation",
            "renewal",
            "fee",
        ],
    ),
    (
        Category::ProductSupport,
        &[
            "login",
            "log in",
            "password",
            "credentials",
            "invalid credentials",
            "reset",
            "error",
            "not working",
            "does not work",
            "doesn't work",
            "help",
            "how to",
            "how do i",
            "broken",
            "bug",
            "crash",
            "crashes",
            "technical",
            "support",
            "troubleshoot",
            "issue",
            "problem",
            "fix",
        ],
    ),
    (
        Category::FeatureRequest,
        &[
            "feature",
            "suggestion",
            "improve",
            "enhancement",
            "add",
            "missing",
            "should have",
            "would be nice",
            "could you add",
            "please include",
            "consider adding",
            "new feature",
            "functionality",
            "capability",
        ],
    ),
    (
        Category::GeneralFeedback,
        &[
            "thank",
            "thanks",
            "great",
            "love",
            "awesome",
            "excellent",
            "amazing",
            "good",
            "appreciate",
            "feedback",
            "enjoyed",
            "wonderful",
            "fantastic",
            "satisfied",
            "helpful",
            "impressive",
        ],
    ),
];

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "wonderful", "amazing", "love", "like", "happy", "pleased",
    "satisfied", "thank", "thanks", "helpful", "appreciate", "awesome", "fantastic", "perfect",
    "best", "impressed",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "poor", "terrible", "awful", "horrible", "disappointed", "upset", "angry", "unhappy",
    "not working", "problem", "issue", "broken", "error", "failed", "wrong", "worst", "hate",
    "dislike", "annoyed", "frustrating", "frustrated",
];

fn word_regex(words: &[&str]) -> Regex {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
}

/// Keyword rules plus optional AI classification.
pub struct Categorizer {
    rules: Vec<(Category, Regex)>,
    positive: Regex,
    negative: Regex,
    llm: Option<Arc<dyn LlmProvider>>,
}

impl Categorizer {
    /// Rules only.
    pub fn new() -> Self {
        Self {
            rules: CATEGORY_KEYWORDS
                .iter()
                .map(|(category, words)| (*category, word_regex(words)))
                .collect(),
            positive: word_regex(POSITIVE_WORDS),
            negative: word_regex(NEGATIVE_WORDS),
            llm: None,
        }
    }

    /// Ask `llm` for a label first, falling back to the rules.
    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Rule-based category for `message`.
    pub fn categorize(&self, message: &InboundMessage) -> Category {
        let text = format!("{} {}", message.subject, message.body_text);
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(&text))
            .map_or(Category::CustomerInquiry, |(category, _)| *category)
    }

    pub fn sentiment(&self, message: &InboundMessage) -> Sentiment {
        let text = format!("{} {}", message.subject, message.body_text);
        let positive = self.positive.find_iter(&text).count();
        let negative = self.negative.find_iter(&text).count();
        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }

    /// Category, sentiment and priority for `message`.
    pub async fn analyze(&self, message: &InboundMessage) -> Analysis {
        let category = match &self.llm {
            Some(llm) => match self.classify_with_llm(llm.as_ref(), message).await {
                Some(category) => category,
                None => self.categorize(message),
            },
            None => self.categorize(message),
        };
        let sentiment = self.sentiment(message);
        Analysis {
            category,
            sentiment,
            priority: priority_for(category, sentiment),
        }
    }

    async fn classify_with_llm(
        &self,
        llm: &dyn LlmProvider,
        message: &InboundMessage,
    ) -> Option<Category> {
        let body: String = message.body_text.chars().take(CLASSIFY_BODY_CHARS).collect();
        let labels = Category::ALL
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(format!(
                "You classify customer emails. Answer with exactly one label from: {labels}. \
                 Output the label only."
            )),
            ChatMessage::user(format!("Subject: {}\n\n{}", message.subject, body)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        match llm.complete(request).await {
            Ok(response) => {
                let category = Category::from_label_or_default(&response.content);
                debug!(raw = %response.content.trim(), %category, "AI classification");
                Some(category)
            }
            Err(e) => {
                warn!(error = %e, "AI classification failed, using keyword rules");
                None
            }
        }
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Complaints and urgent requests are high; support, billing and unhappy
/// senders are medium; everything else is low.
pub fn priority_for(category: Category, sentiment: Sentiment) -> Priority {
    match category {
        Category::Complaint | Category::UrgentRequest => Priority::High,
        Category::ProductSupport | Category::BillingQuestion => Priority::Medium,
        _ if sentiment == Sentiment::Negative => Priority::Medium,
        _ => Priority::Low,
    }
}
