use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use recruit_triage::channels::{EmailConfig, ImapMailbox};
use recruit_triage::config::{CustomizerConfig, TriageConfig};
use recruit_triage::customizer::{DocumentCustomizer, HttpCustomizer};
use recruit_triage::pipeline::types::{Mailbox, role_label};
use recruit_triage::pipeline::{RoleTag, TriagePipeline, TriageTrigger};
use recruit_triage::store::{JsonFileStore, RecipientLedger};

/// Job description used by `test-customize`.
const SAMPLE_JOB_DESCRIPTION: &str = "We are looking for a Senior DevOps Engineer with the following skills:
- 5+ years experience with AWS, Azure, or GCP
- Strong knowledge of Docker and Kubernetes
- Experience with CI/CD tools like Jenkins, GitLab CI/CD
- Infrastructure as Code: Terraform, Ansible
- Scripting: Python, Bash
- Monitoring: Prometheus, Grafana";

#[derive(Parser)]
#[command(name = "recruit-triage", version, about = "Auto-reply to recruiter emails")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for the daily log file
    #[arg(long, env = "TRIAGE_LOG_DIR", default_value = "./data/logs", global = true)]
    log_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one triage pass over recent mail
    Run,
    /// Run on the configured schedule until Ctrl-C
    Watch,
    /// Inspect or reset the recipient ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
    /// Probe the customization service
    Health,
    /// Request a customized document for a sample DevOps job description
    TestCustomize {
        /// Role to request
        #[arg(long, default_value = "devops")]
        role: RoleTag,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Print every recorded recipient as JSON
    Show,
    /// Forget every recorded recipient
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let _log_guard = setup_logging(&cli.log_dir);

    match cli.command {
        Commands::Run => cmd_run().await,
        Commands::Watch => cmd_watch().await,
        Commands::Ledger { action } => cmd_ledger(action).await,
        Commands::Health => cmd_health().await,
        Commands::TestCustomize { role } => cmd_test_customize(role).await,
    }
}

/// stderr plus a daily-rolling file. The guard must outlive `main`.
fn setup_logging(log_dir: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    if std::fs::create_dir_all(log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::daily(log_dir, "recruit-triage.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        None
    }
}

// ── Wiring ──────────────────────────────────────────────────────────

async fn build_pipeline() -> anyhow::Result<Arc<TriagePipeline>> {
    let email_config = EmailConfig::from_env().context("email configuration")?;
    let mailbox = ImapMailbox::new(email_config);
    let config = TriageConfig::from_env(Some(mailbox.own_address()))
        .context("triage configuration")?;

    let ledger = RecipientLedger::open(Arc::new(JsonFileStore::new(&config.ledger_path))).await;
    let customizer = HttpCustomizer::new(CustomizerConfig::from_env());

    info!(
        mailbox = mailbox.name(),
        ledger = %config.ledger_path.display(),
        auto_send = config.auto_send,
        window_days = config.search_window_days,
        "Pipeline configured"
    );

    Ok(Arc::new(TriagePipeline::new(
        Arc::new(config),
        Arc::new(mailbox),
        Arc::new(customizer),
        Arc::new(ledger),
    )))
}

// ── Commands ────────────────────────────────────────────────────────

async fn cmd_run() -> anyhow::Result<()> {
    let pipeline = build_pipeline().await?;
    let summary = pipeline.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn cmd_watch() -> anyhow::Result<()> {
    let pipeline = build_pipeline().await?;
    let trigger = TriageTrigger::new(&pipeline.config().trigger_schedule)?;
    trigger.install(Arc::clone(&pipeline));
    if let Some(next) = trigger.next_fire() {
        info!(next = %next, "Waiting for first scheduled run");
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    trigger.remove();
    Ok(())
}

async fn cmd_ledger(action: LedgerAction) -> anyhow::Result<()> {
    let store = JsonFileStore::new(TriageConfig::ledger_path_from_env());
    let ledger = RecipientLedger::open(Arc::new(store)).await;
    match action {
        LedgerAction::Show => {
            let snapshot = ledger.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        LedgerAction::Clear => {
            let removed = ledger.clear().await?;
            println!("Cleared {removed} recipient(s)");
        }
    }
    Ok(())
}

async fn cmd_health() -> anyhow::Result<()> {
    let customizer = HttpCustomizer::new(CustomizerConfig::from_env());
    if customizer.check_health().await {
        Ok(())
    } else {
        anyhow::bail!("customization service is unhealthy")
    }
}

async fn cmd_test_customize(role: RoleTag) -> anyhow::Result<()> {
    let customizer = HttpCustomizer::new(CustomizerConfig::from_env());
    info!(role = role_label(Some(role)), "Requesting sample customization");
    match customizer
        .request_customization(SAMPLE_JOB_DESCRIPTION, role)
        .await
    {
        Some(doc) => {
            println!("Received {} ({} bytes)", doc.filename, doc.bytes.len());
            Ok(())
        }
        None => anyhow::bail!("customization failed, see log for details"),
    }
}
