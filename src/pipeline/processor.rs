//! Mailbox processor. Runs one poll cycle and decides the fate of each
//! fetched message.
//!
//! Per message, in order: duplicate check, self-loop check, spam filter,
//! per-sender rate limit, categorization, generation (fallback template
//! when unavailable), send, record, acknowledge. Nothing is recorded
//! before a reply has actually gone out, except deliberate skips and
//! replies the mail server will never accept.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::channels::email_types::build_reply;
use crate::error::{FailureKind, LlmError, PipelineError};
use crate::pipeline::categorizer::Categorizer;
use crate::pipeline::filter::SpamFilter;
use crate::pipeline::responder::{ResponseGenerator, fallback_reply};
use crate::pipeline::types::{
    Category, InboundMessage, MailSender, MailSource, Outcome, SkipReason,
};
use crate::store::{ProcessedRecord, ProcessedStore};

/// Back-off applied when a quota error carries no retry hint.
const DEFAULT_GENERATION_BACKOFF: Duration = Duration::from_secs(60);

/// Processing knobs, read from the environment by `AppConfig`.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Most messages handled per cycle.
    pub max_per_cycle: usize,
    /// Fetch window in days.
    pub days_to_check: u32,
    pub spam_threshold: f64,
    /// Records allowed per sender inside `rate_limit_window`.
    pub max_per_sender: usize,
    pub rate_limit_window: Duration,
    /// Attach an HTML alternative to replies.
    pub use_html: bool,
    /// Ask the model for a category before falling back to keywords.
    pub ai_categorization: bool,
    /// Our own mailbox address, lower-cased.
    pub own_address: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_per_cycle: 1,
            days_to_check: 7,
            spam_threshold: 0.5,
            max_per_sender: 3,
            rate_limit_window: Duration::from_secs(24 * 3600),
            use_html: true,
            ai_categorization: false,
            own_address: String::new(),
        }
    }
}

/// Tally of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub replied: usize,
    /// Replies that used the fallback template. Included in `replied`.
    pub fallback: usize,
    pub skipped: usize,
    pub deferred: usize,
    /// The fetch itself failed.
    pub fetch_failed: bool,
}

impl CycleReport {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Replied { fallback, .. } => {
                self.replied += 1;
                if *fallback {
                    self.fallback += 1;
                }
            }
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Deferred { .. } => self.deferred += 1,
        }
    }
}

pub struct MailboxProcessor {
    source: Arc<dyn MailSource>,
    sender: Arc<dyn MailSender>,
    store: Arc<dyn ProcessedStore>,
    filter: SpamFilter,
    categorizer: Categorizer,
    responder: ResponseGenerator,
    config: ProcessorConfig,
    /// Generation is skipped until this instant after a quota error.
    generation_backoff_until: Mutex<Option<Instant>>,
}

impl MailboxProcessor {
    pub fn new(
        source: Arc<dyn MailSource>,
        sender: Arc<dyn MailSender>,
        store: Arc<dyn ProcessedStore>,
        categorizer: Categorizer,
        responder: ResponseGenerator,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            source,
            sender,
            store,
            filter: SpamFilter::new(config.spam_threshold),
            categorizer,
            responder,
            config,
            generation_backoff_until: Mutex::new(None),
        }
    }

    /// Fetch and handle one batch of messages.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let since = Utc::now() - chrono::Duration::days(i64::from(self.config.days_to_check));

        let mut messages = match self.source.fetch(since, self.config.max_per_cycle).await {
            Ok(messages) => messages,
            Err(e) => {
                let e = PipelineError::Fetch(e);
                match e.kind() {
                    FailureKind::Auth => error!(error = %e, "Mailbox rejected credentials"),
                    _ => warn!(error = %e, "Fetch failed, retrying next cycle"),
                }
                report.fetch_failed = true;
                return report;
            }
        };
        messages.truncate(self.config.max_per_cycle);
        report.fetched = messages.len();

        if messages.is_empty() {
            debug!("No new messages");
            return report;
        }

        for message in &messages {
            let outcome = self.process_message(message).await;
            info!(
                message_id = %message.message_id,
                sender = %message.sender_address,
                outcome = outcome.label(),
                "Message handled"
            );
            report.record(&outcome);
        }
        report
    }

    /// Handle a single message. Errors never escape: anything that stops
    /// the message from being answered and recorded becomes `Deferred`.
    pub async fn process_message(&self, message: &InboundMessage) -> Outcome {
        match self.try_process(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                match e.kind() {
                    FailureKind::Auth => error!(
                        message_id = %message.message_id,
                        error = %e,
                        "Authentication failure while handling message"
                    ),
                    _ => warn!(
                        message_id = %message.message_id,
                        error = %e,
                        "Message deferred to next cycle"
                    ),
                }
                Outcome::Deferred {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_process(&self, message: &InboundMessage) -> Result<Outcome, PipelineError> {
        if self.store.has_been_processed(&message.message_id).await? {
            debug!(message_id = %message.message_id, "Already processed");
            self.acknowledge(message).await;
            return Ok(Outcome::Skipped(SkipReason::Duplicate));
        }

        let sender = message.sender_address.trim().to_lowercase();
        if !self.config.own_address.is_empty() && sender == self.config.own_address {
            debug!(message_id = %message.message_id, "Skipping message from own mailbox");
            let category = self.categorizer.categorize(message);
            return self.skip(message, category, SkipReason::OwnAddress).await;
        }

        let verdict = self.filter.evaluate(message);
        if verdict.is_spam {
            info!(
                message_id = %message.message_id,
                score = verdict.score,
                reasons = ?verdict.reasons,
                "Spam filtered"
            );
            return self.skip(message, Category::Spam, SkipReason::Spam).await;
        }

        let recent = self
            .store
            .count_recent_for_sender(&sender, self.config.rate_limit_window)
            .await?;
        if recent >= self.config.max_per_sender {
            info!(
                sender = %sender,
                recent,
                limit = self.config.max_per_sender,
                "Sender rate limit reached"
            );
            let category = self.categorizer.categorize(message);
            return self.skip(message, category, SkipReason::RateLimited).await;
        }

        let analysis = self.categorizer.analyze(message).await;
        if analysis.category == Category::Spam {
            info!(message_id = %message.message_id, "Categorized as spam");
            return self.skip(message, Category::Spam, SkipReason::Spam).await;
        }

        if let Some(until) = *self.generation_backoff_until.lock().await {
            if Instant::now() < until {
                return Ok(Outcome::Deferred {
                    reason: "generation backing off after quota error".into(),
                });
            }
        }

        let body = self.filter.sanitize_body(&message.body_text);
        let (reply_body, fallback) = match self.responder.generate(message, &body, &analysis).await
        {
            Ok(text) => (text, false),
            Err(e) if e.kind() == FailureKind::RateLimitExceeded => {
                let wait = match &e {
                    LlmError::RateLimited {
                        retry_after: Some(d),
                        ..
                    } => *d,
                    _ => DEFAULT_GENERATION_BACKOFF,
                };
                warn!(error = %e, backoff_secs = wait.as_secs(), "Generation quota exhausted");
                *self.generation_backoff_until.lock().await = Some(Instant::now() + wait);
                return Err(PipelineError::Generation(e));
            }
            // Bad API key: leave the message unrecorded.
            Err(e) if e.kind() == FailureKind::Auth => {
                return Err(PipelineError::Generation(e));
            }
            Err(e) => {
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Generation unavailable, using fallback reply"
                );
                (fallback_reply(analysis.category, message.greeting_name()), true)
            }
        };

        let reply = build_reply(message, reply_body);
        if let Err(e) = self.sender.send(&reply, self.config.use_html).await {
            let e = PipelineError::Send(e);
            if e.kind() != FailureKind::Permanent {
                return Err(e);
            }
            warn!(
                message_id = %message.message_id,
                to = %reply.to,
                error = %e,
                "Reply undeliverable, not retrying"
            );
            return self
                .skip(message, analysis.category, SkipReason::Undeliverable)
                .await;
        }
        info!(
            to = %reply.to,
            subject = %reply.subject,
            category = %analysis.category,
            sentiment = analysis.sentiment.as_str(),
            priority = analysis.priority.as_str(),
            fallback,
            "Reply sent"
        );

        let record = ProcessedRecord::new(
            &message.message_id,
            &sender,
            analysis.category,
            &message.subject,
            true,
        );
        if let Err(e) = self.store.mark_processed(&record).await {
            error!(message_id = %message.message_id, error = %e, "Reply sent but not recorded");
        }
        self.acknowledge(message).await;

        Ok(Outcome::Replied {
            category: analysis.category,
            fallback,
        })
    }

    /// Record a deliberate skip and acknowledge the message.
    async fn skip(
        &self,
        message: &InboundMessage,
        category: Category,
        reason: SkipReason,
    ) -> Result<Outcome, PipelineError> {
        let record = ProcessedRecord::new(
            &message.message_id,
            &message.sender_address,
            category,
            &message.subject,
            false,
        );
        self.store.mark_processed(&record).await?;
        self.acknowledge(message).await;
        Ok(Outcome::Skipped(reason))
    }

    async fn acknowledge(&self, message: &InboundMessage) {
        if let Err(e) = self.source.acknowledge(message).await {
            warn!(uid = %message.uid, error = %e, "Failed to mark message as seen");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::error::MailError;
    use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
    use crate::pipeline::types::OutboundReply;
    use crate::store::LibSqlTracker;

    // ── Mocks ───────────────────────────────────────────────────────

    #[derive(Default)]
    struct MockSource {
        inbox: std::sync::Mutex<Vec<InboundMessage>>,
        acknowledged: std::sync::Mutex<Vec<String>>,
        fetch_auth_failure: bool,
        last_limit: std::sync::Mutex<Option<usize>>,
    }

    #[async_trait]
    impl MailSource for MockSource {
        async fn fetch(
            &self,
            _since: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<InboundMessage>, MailError> {
            *self.last_limit.lock().unwrap() = Some(limit);
            if self.fetch_auth_failure {
                return Err(MailError::AuthFailed {
                    server: "imap.test".into(),
                    reason: "NO [AUTHENTICATIONFAILED]".into(),
                });
            }
            // Ignores the limit so the processor's own cap is exercised.
            Ok(self.inbox.lock().unwrap().clone())
        }

        async fn acknowledge(&self, message: &InboundMessage) -> Result<(), MailError> {
            self.acknowledged.lock().unwrap().push(message.uid.clone());
            Ok(())
        }

        async fn verify(&self) -> Result<(), MailError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockSender {
        sent: std::sync::Mutex<Vec<OutboundReply>>,
        fail: bool,
        /// Recipient that cannot be parsed as an address.
        invalid_recipient: Option<&'static str>,
    }

    #[async_trait]
    impl MailSender for MockSender {
        async fn send(&self, reply: &OutboundReply, _html: bool) -> Result<(), MailError> {
            if self.invalid_recipient == Some(reply.to.as_str()) {
                return Err(MailError::InvalidAddress {
                    address: reply.to.clone(),
                    reason: "Invalid email address".into(),
                });
            }
            if self.fail {
                return Err(MailError::Timeout {
                    server: "smtp.test".into(),
                });
            }
            self.sent.lock().unwrap().push(reply.clone());
            Ok(())
        }
    }

    enum Script {
        Reply(&'static str),
        Fail,
        Quota,
        BadKey,
    }

    struct MockLlm {
        script: Script,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Reply(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    input_tokens: 10,
                    output_tokens: 10,
                    finish_reason: FinishReason::Stop,
                }),
                Script::Fail => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "503 UNAVAILABLE".into(),
                }),
                Script::BadKey => Err(LlmError::AuthFailed {
                    provider: "mock".into(),
                }),
                Script::Quota => Err(LlmError::RateLimited {
                    provider: "mock".into(),
                    retry_after: Some(Duration::from_secs(30)),
                }),
            }
        }
    }

    struct Harness {
        source: Arc<MockSource>,
        sender: Arc<MockSender>,
        store: Arc<LibSqlTracker>,
        llm: Arc<MockLlm>,
        processor: MailboxProcessor,
    }

    async fn harness(script: Script, source: MockSource, sender: MockSender) -> Harness {
        let source = Arc::new(source);
        let sender = Arc::new(sender);
        let store = Arc::new(
            LibSqlTracker::new_memory(chrono::Duration::days(7))
                .await
                .unwrap(),
        );
        let llm = Arc::new(MockLlm {
            script,
            calls: AtomicUsize::new(0),
        });
        let processor = MailboxProcessor::new(
            source.clone(),
            sender.clone(),
            store.clone(),
            Categorizer::new(),
            ResponseGenerator::new(llm.clone(), 0.7, 512, Duration::from_secs(5)),
            ProcessorConfig {
                max_per_cycle: 5,
                own_address: "support@example.com".into(),
                ..ProcessorConfig::default()
            },
        );
        Harness {
            source,
            sender,
            store,
            llm,
            processor,
        }
    }

    fn msg(id: &str, sender: &str, subject: &str, body: &str) -> InboundMessage {
        InboundMessage {
            uid: id.trim_matches(|c| c == '<' || c == '>').to_string(),
            message_id: id.to_string(),
            sender_address: sender.to_string(),
            sender_name: None,
            subject: subject.to_string(),
            body_text: body.to_string(),
            received_at: Utc::now(),
            references_header: None,
            in_reply_to_header: None,
        }
    }

    fn complaint() -> InboundMessage {
        let mut m = msg(
            "<c1@example.com>",
            "jane@example.com",
            "Terrible service experience",
            "I am extremely disappointed with the service I received yesterday.",
        );
        m.sender_name = Some("Jane".into());
        m
    }

    // ── Scenarios ───────────────────────────────────────────────────

    #[tokio::test]
    async fn complaint_is_answered_and_recorded() {
        let h = harness(
            Script::Reply("Dear Jane,\n\nWe sincerely apologize."),
            MockSource::default(),
            MockSender::default(),
        )
        .await;
        let m = complaint();

        let outcome = h.processor.process_message(&m).await;
        assert_eq!(
            outcome,
            Outcome::Replied {
                category: Category::Complaint,
                fallback: false
            }
        );

        let sent = h.sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane@example.com");
        assert_eq!(sent[0].subject, "Re: Terrible service experience");
        assert_eq!(sent[0].in_reply_to, "<c1@example.com>");
        assert!(sent[0].body_text.contains("apologize"));

        assert!(h.store.has_been_processed("<c1@example.com>").await.unwrap());
        assert_eq!(*h.source.acknowledged.lock().unwrap(), vec!["c1@example.com"]);
    }

    #[tokio::test]
    async fn product_support_is_categorized() {
        let h = harness(
            Script::Reply("Hello,\n\n1. Open settings."),
            MockSource::default(),
            MockSender::default(),
        )
        .await;
        let m = msg(
            "<p1@example.com>",
            "sam@example.com",
            "Can't log in",
            "I can't log in to my account. It keeps saying invalid credentials.",
        );
        let outcome = h.processor.process_message(&m).await;
        assert_eq!(
            outcome,
            Outcome::Replied {
                category: Category::ProductSupport,
                fallback: false
            }
        );
    }

    #[tokio::test]
    async fn duplicate_is_not_sent() {
        let h = harness(Script::Reply("Hi"), MockSource::default(), MockSender::default()).await;
        let m = complaint();
        h.processor.process_message(&m).await;
        let outcome = h.processor.process_message(&m).await;

        assert_eq!(outcome, Outcome::Skipped(SkipReason::Duplicate));
        assert_eq!(h.sender.sent.lock().unwrap().len(), 1);
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sender_at_ceiling_is_skipped() {
        let h = harness(Script::Reply("Hi"), MockSource::default(), MockSender::default()).await;
        for i in 0..3 {
            let record = ProcessedRecord::new(
                format!("<old{i}@example.com>"),
                "Jane@Example.com",
                Category::CustomerInquiry,
                "earlier",
                true,
            );
            h.store.mark_processed(&record).await.unwrap();
        }

        let outcome = h.processor.process_message(&complaint()).await;
        assert_eq!(outcome, Outcome::Skipped(SkipReason::RateLimited));
        assert!(h.sender.sent.lock().unwrap().is_empty());
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
        assert!(h.store.has_been_processed("<c1@example.com>").await.unwrap());
    }

    #[tokio::test]
    async fn spam_is_recorded_not_sent() {
        let h = harness(Script::Reply("Hi"), MockSource::default(), MockSender::default()).await;
        let m = msg(
            "<s1@spam.test>",
            "noreply@lottery.test",
            "YOU ARE A WINNER CLAIM YOUR PRIZE",
            "Claim your lottery jackpot now! Free money, act now, limited time.",
        );
        let outcome = h.processor.process_message(&m).await;
        assert_eq!(outcome, Outcome::Skipped(SkipReason::Spam));
        assert!(h.sender.sent.lock().unwrap().is_empty());

        let stats = h.store.stats().await.unwrap();
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.replies_sent, 0);
        assert_eq!(stats.by_category.get("spam"), Some(&1));
    }

    #[tokio::test]
    async fn own_address_is_skipped() {
        let h = harness(Script::Reply("Hi"), MockSource::default(), MockSender::default()).await;
        let m = msg("<o1@example.com>", "Support@Example.com", "Re: hello", "Thanks for writing.");
        let outcome = h.processor.process_message(&m).await;
        assert_eq!(outcome, Outcome::Skipped(SkipReason::OwnAddress));
        assert!(h.sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_sends_fallback_once() {
        let h = harness(Script::Fail, MockSource::default(), MockSender::default()).await;
        let m = complaint();
        let outcome = h.processor.process_message(&m).await;
        assert_eq!(
            outcome,
            Outcome::Replied {
                category: Category::Complaint,
                fallback: true
            }
        );

        let sent = h.sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body_text.starts_with("Dear Jane,"));
        assert!(sent[0].body_text.contains("sincerely apologize"));

        let stats = h.store.stats().await.unwrap();
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.replies_sent, 1);
    }

    #[tokio::test]
    async fn send_failure_defers_without_record() {
        let sender = MockSender {
            fail: true,
            ..MockSender::default()
        };
        let h = harness(Script::Reply("Hi"), MockSource::default(), sender).await;
        let m = complaint();
        let outcome = h.processor.process_message(&m).await;
        assert!(matches!(outcome, Outcome::Deferred { .. }));
        assert!(!h.store.has_been_processed("<c1@example.com>").await.unwrap());
        assert!(h.source.acknowledged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn quota_error_defers_and_backs_off() {
        let h = harness(Script::Quota, MockSource::default(), MockSender::default()).await;
        let first = complaint();
        let mut second = complaint();
        second.message_id = "<c2@example.com>".into();

        assert!(matches!(
            h.processor.process_message(&first).await,
            Outcome::Deferred { .. }
        ));
        assert!(matches!(
            h.processor.process_message(&second).await,
            Outcome::Deferred { .. }
        ));

        // The second message never reached the model.
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 1);
        assert!(h.sender.sent.lock().unwrap().is_empty());
        assert!(!h.store.has_been_processed("<c1@example.com>").await.unwrap());
    }

    #[tokio::test]
    async fn rejected_api_key_defers_without_reply() {
        let h = harness(Script::BadKey, MockSource::default(), MockSender::default()).await;
        let m = complaint();
        let outcome = h.processor.process_message(&m).await;

        assert!(matches!(outcome, Outcome::Deferred { .. }));
        assert!(h.sender.sent.lock().unwrap().is_empty());
        assert!(!h.store.has_been_processed("<c1@example.com>").await.unwrap());
        assert!(h.source.acknowledged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn undeliverable_reply_does_not_block_older_mail() {
        let source = MockSource::default();
        {
            let mut inbox = source.inbox.lock().unwrap();
            inbox.push(msg(
                "<new@example.com>",
                "bad address@example.com",
                "Question",
                "Could you tell me your opening hours?",
            ));
            inbox.push(msg(
                "<old@example.com>",
                "sam@example.com",
                "Question",
                "Could you tell me your opening hours?",
            ));
        }
        let sender = MockSender {
            invalid_recipient: Some("bad address@example.com"),
            ..MockSender::default()
        };
        let mut h = harness(Script::Reply("Hello,\n\nWe open at 9."), source, sender).await;
        h.processor.config.max_per_cycle = 1;

        let first = h.processor.run_cycle().await;
        assert_eq!(first.skipped, 1);
        assert_eq!(first.deferred, 0);
        assert!(h.store.has_been_processed("<new@example.com>").await.unwrap());
        assert_eq!(*h.source.acknowledged.lock().unwrap(), vec!["new@example.com"]);

        // The mock inbox ignores \Seen, so drop the handled message by hand.
        h.source.inbox.lock().unwrap().remove(0);
        let second = h.processor.run_cycle().await;
        assert_eq!(second.replied, 1);
        let sent = h.sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "sam@example.com");

        let stats = h.store.stats().await.unwrap();
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.replies_sent, 1);
    }

    #[tokio::test]
    async fn cycle_caps_messages() {
        let source = MockSource::default();
        {
            let mut inbox = source.inbox.lock().unwrap();
            for i in 0..8 {
                inbox.push(msg(
                    &format!("<q{i}@example.com>"),
                    &format!("user{i}@example.com"),
                    "Question",
                    "Could you tell me your opening hours?",
                ));
            }
        }
        let h = harness(Script::Reply("Hello,\n\nWe open at 9."), source, MockSender::default()).await;

        let report = h.processor.run_cycle().await;
        assert_eq!(*h.source.last_limit.lock().unwrap(), Some(5));
        assert_eq!(report.fetched, 5);
        assert_eq!(report.replied, 5);
        assert_eq!(h.sender.sent.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn fetch_auth_failure_ends_cycle() {
        let source = MockSource {
            fetch_auth_failure: true,
            ..MockSource::default()
        };
        let h = harness(Script::Reply("Hi"), source, MockSender::default()).await;
        let report = h.processor.run_cycle().await;
        assert!(report.fetch_failed);
        assert_eq!(report.fetched, 0);
    }
}
