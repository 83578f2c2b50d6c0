//! Poll loop.
//!
//! Runs one processor cycle at a time and sleeps `interval` between cycles.
//! A stop request lets the in-flight cycle finish and interrupts the sleep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::pipeline::processor::{CycleReport, MailboxProcessor};

/// Cumulative counts across the whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub cycles: u64,
    pub fetched: usize,
    pub replied: usize,
    pub fallback: usize,
    pub skipped: usize,
    pub deferred: usize,
    pub failed_fetches: usize,
}

impl SessionStats {
    fn absorb(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.fetched += report.fetched;
        self.replied += report.replied;
        self.fallback += report.fallback;
        self.skipped += report.skipped;
        self.deferred += report.deferred;
        if report.fetch_failed {
            self.failed_fetches += 1;
        }
    }
}

/// Cloneable handle that asks the loop to stop.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

/// Loop state, owned by the caller and passed to [`run`].
pub struct PollController {
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
    interval: Duration,
    last_check: Option<DateTime<Utc>>,
    stats: SessionStats,
}

impl PollController {
    pub fn new(interval: Duration) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
            interval,
            last_check: None,
            stats: SessionStats::default(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            notify: Arc::clone(&self.notify),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start time of the most recent cycle.
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

/// Run cycles until stopped.
pub async fn run(controller: &mut PollController, processor: &MailboxProcessor) {
    info!(
        interval_secs = controller.interval.as_secs(),
        "Polling mailbox"
    );

    while controller.is_running() {
        controller.last_check = Some(Utc::now());
        let report = processor.run_cycle().await;
        controller.stats.absorb(&report);
        debug!(
            cycle = controller.stats.cycles,
            fetched = report.fetched,
            replied = report.replied,
            skipped = report.skipped,
            deferred = report.deferred,
            "Cycle complete"
        );

        if !controller.is_running() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(controller.interval) => {}
            _ = controller.notify.notified() => {}
        }
    }

    info!(cycles = controller.stats.cycles, "Polling stopped");
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::{LlmError, MailError};
    use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::pipeline::categorizer::Categorizer;
    use crate::pipeline::processor::ProcessorConfig;
    use crate::pipeline::responder::ResponseGenerator;
    use crate::pipeline::types::{InboundMessage, MailSender, MailSource, OutboundReply};
    use crate::store::LibSqlTracker;

    struct EmptyInbox;

    #[async_trait]
    impl MailSource for EmptyInbox {
        async fn fetch(
            &self,
            _since: DateTime<Utc>,
            _limit: usize,
        ) -> Result<Vec<InboundMessage>, MailError> {
            Ok(Vec::new())
        }

        async fn acknowledge(&self, _message: &InboundMessage) -> Result<(), MailError> {
            Ok(())
        }

        async fn verify(&self) -> Result<(), MailError> {
            Ok(())
        }
    }

    struct NullSender;

    #[async_trait]
    impl MailSender for NullSender {
        async fn send(&self, _reply: &OutboundReply, _html: bool) -> Result<(), MailError> {
            Ok(())
        }
    }

    struct NullLlm;

    #[async_trait]
    impl LlmProvider for NullLlm {
        fn model_name(&self) -> &str {
            "null"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "null".into(),
                reason: "unused".into(),
            })
        }
    }

    async fn processor() -> MailboxProcessor {
        let store = LibSqlTracker::new_memory(chrono::Duration::days(7))
            .await
            .unwrap();
        MailboxProcessor::new(
            Arc::new(EmptyInbox),
            Arc::new(NullSender),
            Arc::new(store),
            Categorizer::new(),
            ResponseGenerator::new(Arc::new(NullLlm), 0.7, 256, Duration::from_secs(5)),
            ProcessorConfig::default(),
        )
    }

    #[tokio::test]
    async fn stopped_before_start_runs_nothing() {
        let processor = processor().await;
        let mut controller = PollController::new(Duration::from_secs(30));
        controller.stop_handle().stop();
        run(&mut controller, &processor).await;
        assert_eq!(controller.stats().cycles, 0);
        assert!(controller.last_check().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_sleep() {
        let processor = processor().await;
        let mut controller = PollController::new(Duration::from_secs(3600));
        let handle = controller.stop_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            handle.stop();
        });

        let started = tokio::time::Instant::now();
        run(&mut controller, &processor).await;

        assert_eq!(controller.stats().cycles, 1);
        assert!(controller.last_check().is_some());
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_repeat_on_interval() {
        let processor = processor().await;
        let mut controller = PollController::new(Duration::from_secs(30));
        let handle = controller.stop_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(75)).await;
            handle.stop();
        });

        run(&mut controller, &processor).await;
        // Cycles at t=0, 30 and 60; stopped while sleeping towards 90.
        assert_eq!(controller.stats().cycles, 3);
    }
}
