use std::path::Path;
use std::sync::Arc;

use inbox_responder::channels::EmailChannel;
use inbox_responder::config::AppConfig;
use inbox_responder::error::FailureKind;
use inbox_responder::llm::{create_provider, verify_provider};
use inbox_responder::pipeline::categorizer::Categorizer;
use inbox_responder::pipeline::poller::{self, PollController};
use inbox_responder::pipeline::processor::MailboxProcessor;
use inbox_responder::pipeline::responder::ResponseGenerator;
use inbox_responder::pipeline::types::{MailSender, MailSource};
use inbox_responder::store::{LibSqlTracker, ProcessedStore};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() {
    // A missing .env is fine; variables may come from the real environment.
    let _ = dotenvy::dotenv();

    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Error: failed to install rustls crypto provider");
        std::process::exit(1);
    }

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Copy .env.example to .env and fill in the required values.");
        std::process::exit(1);
    });

    // ── Logging ─────────────────────────────────────────────────────
    let default_level = if config.debug_mode { "debug" } else { "info" };
    let log_dir = config
        .log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let log_name = config
        .log_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "email_automation.log".into());
    let (file_writer, _log_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, log_name));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    eprintln!("📬 Inbox Responder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mailbox: {}", config.email.address);
    eprintln!("   IMAP: {}:{}", config.email.imap_host, config.email.imap_port);
    eprintln!("   SMTP: {}:{}", config.email.smtp_host, config.email.smtp_port);
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Check interval: {}s", config.check_interval.as_secs());
    eprintln!(
        "   Per cycle: {} | Window: {} days | Per sender: {} / {}h",
        config.processor.max_per_cycle,
        config.processor.days_to_check,
        config.processor.max_per_sender,
        config.processor.rate_limit_window.as_secs() / 3600,
    );
    eprintln!(
        "   HTML replies: {} | AI categorization: {}",
        config.processor.use_html, config.processor.ai_categorization
    );
    eprintln!("   Tracker: {}", config.tracker_db_path.display());
    eprintln!("   Log file: {}", config.log_file.display());
    eprintln!("   Press Ctrl-C to stop.\n");

    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }

    // ── Tracker ─────────────────────────────────────────────────────
    let store: Arc<dyn ProcessedStore> = Arc::new(
        LibSqlTracker::open_or_memory(&config.tracker_db_path, config.retention())
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: failed to open tracker: {e}");
                std::process::exit(1);
            }),
    );

    // ── LLM ─────────────────────────────────────────────────────────
    let llm = create_provider(&config.llm).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    if let Err(e) = verify_provider(llm.as_ref()).await {
        if e.kind() == FailureKind::Auth {
            eprintln!("Error: {e}");
            eprintln!("  Check GEMINI_API_KEY.");
            std::process::exit(1);
        }
        tracing::warn!(error = %e, "Gemini check failed, continuing");
    }
    let categorizer = if config.processor.ai_categorization {
        Categorizer::new().with_llm(Arc::clone(&llm))
    } else {
        Categorizer::new()
    };
    let responder = ResponseGenerator::new(
        llm,
        config.llm.temperature,
        config.llm.max_output_tokens,
        config.llm.timeout,
    );

    // ── Mailbox ─────────────────────────────────────────────────────
    let channel = Arc::new(EmailChannel::new(config.email.clone()));
    if let Err(e) = channel.verify().await {
        if e.kind() == FailureKind::Auth {
            eprintln!("Error: {e}");
            eprintln!("  Check EMAIL_ADDRESS and EMAIL_PASSWORD (use a Gmail app password).");
            std::process::exit(1);
        }
        tracing::warn!(error = %e, "Mailbox check failed, will retry on first cycle");
    }

    let source: Arc<dyn MailSource> = channel.clone();
    let sender: Arc<dyn MailSender> = channel;
    let processor = MailboxProcessor::new(
        source,
        sender,
        Arc::clone(&store),
        categorizer,
        responder,
        config.processor.clone(),
    );

    // ── Loop ────────────────────────────────────────────────────────
    let mut controller = PollController::new(config.check_interval);
    let stop = controller.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing current cycle");
            stop.stop();
        }
    });

    poller::run(&mut controller, &processor).await;

    let session = controller.stats();
    eprintln!("\n📊 Session summary");
    eprintln!("   Cycles: {}", session.cycles);
    eprintln!(
        "   Replied: {} ({} fallback) | Skipped: {} | Deferred: {}",
        session.replied, session.fallback, session.skipped, session.deferred
    );
    match store.stats().await {
        Ok(stats) => {
            eprintln!(
                "   Tracker: {} processed, {} replies sent",
                stats.total_processed, stats.replies_sent
            );
            for (category, count) in &stats.by_category {
                eprintln!("     {category}: {count}");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Could not read tracker statistics"),
    }
}
