use bulkpay::application::dispatcher::BatchDispatcher;
use bulkpay::application::forwarder::Forwarder;
use bulkpay::config::DispatchConfig;
use bulkpay::domain::instruction::Batch;
use bulkpay::domain::outcome::BatchResult;
use bulkpay::domain::ports::ChannelRef;
use bulkpay::infrastructure::http_channel::HttpTransactionChannel;
use bulkpay::infrastructure::in_memory::InMemoryBatchStore;
use bulkpay::infrastructure::metrics::CounterMetrics;
use bulkpay::infrastructure::scripted_channel::ScriptedChannel;
use bulkpay::interfaces::csv::instruction_reader::InstructionReader;
use bulkpay::interfaces::csv::outcome_writer::OutcomeWriter;
use bulkpay::interfaces::json::batch_request::{BatchRequest, BatchResponse};
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Batch files to submit (`.json` batch requests or instruction CSVs)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Batch id for CSV inputs (defaults to the file stem)
    #[arg(long)]
    batch_id: Option<String>,

    /// JSON configuration file
    #[arg(long, env = "BULKPAY_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the downstream transaction service
    #[arg(long, env = "BULKPAY_DOWNSTREAM_URL")]
    downstream_url: Option<String>,

    /// Attempts per instruction before falling back to a failed outcome
    #[arg(long, env = "BULKPAY_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Delay after the first failed attempt, in milliseconds
    #[arg(long, env = "BULKPAY_BACKOFF_MS")]
    backoff_ms: Option<u64>,

    /// Per-attempt timeout, in milliseconds
    #[arg(long, env = "BULKPAY_ATTEMPT_TIMEOUT_MS")]
    attempt_timeout_ms: Option<u64>,

    /// How long a duplicate submission waits for the original, in milliseconds
    #[arg(long, env = "BULKPAY_DUPLICATE_WAIT_MS")]
    duplicate_wait_ms: Option<u64>,

    /// Instructions forwarded concurrently within a batch
    #[arg(long, env = "BULKPAY_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Output format for batch results
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Batch ids to look up after all submissions finish
    #[arg(long)]
    lookup: Vec<String>,

    /// Accept every transaction locally instead of calling the downstream service
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn config(&self) -> Result<DispatchConfig> {
        let mut config = DispatchConfig::load(self.config.as_deref()).into_diagnostic()?;
        if let Some(url) = &self.downstream_url {
            config.downstream.base_url = url.clone();
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(backoff_ms) = self.backoff_ms {
            config.retry.initial_backoff = Duration::from_millis(backoff_ms);
        }
        if let Some(timeout_ms) = self.attempt_timeout_ms {
            config.retry.attempt_timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(wait_ms) = self.duplicate_wait_ms {
            config.dispatcher.duplicate_wait = Duration::from_millis(wait_ms);
        }
        if let Some(concurrency) = self.concurrency {
            config.dispatcher.instruction_concurrency = concurrency;
        }
        config.validate().into_diagnostic()?;
        Ok(config)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_batch(path: &Path, batch_id: Option<&str>) -> Result<Batch> {
    let file = File::open(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot open {}", path.display()))?;

    let batch = if path.extension().is_some_and(|ext| ext == "json") {
        BatchRequest::from_reader(file).and_then(BatchRequest::into_batch)
    } else {
        let batch_id = batch_id
            .map(str::to_string)
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();
        InstructionReader::new(file).read_batch(batch_id)
    };

    batch
        .into_diagnostic()
        .wrap_err_with(|| format!("invalid batch in {}", path.display()))
}

fn write_results(format: OutputFormat, results: &[BatchResult]) -> Result<()> {
    let stdout = io::stdout();
    match format {
        OutputFormat::Csv => {
            let mut writer = OutcomeWriter::new(stdout.lock());
            for result in results {
                writer.write_result(result).into_diagnostic()?;
            }
        }
        OutputFormat::Json => {
            let mut out = stdout.lock();
            for result in results {
                let line = serde_json::to_string(&BatchResponse::from(result)).into_diagnostic()?;
                writeln!(out, "{line}").into_diagnostic()?;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    let config = cli.config()?;

    // Structural validation happens before anything is submitted.
    let batches = cli
        .inputs
        .iter()
        .map(|path| read_batch(path, cli.batch_id.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    let channel: ChannelRef = if cli.dry_run {
        tracing::warn!("Dry run: transactions are accepted locally and never forwarded");
        Arc::new(ScriptedChannel::new())
    } else {
        Arc::new(
            HttpTransactionChannel::new(
                &config.downstream.base_url,
                &config.downstream.path,
                config.retry.attempt_timeout,
            )
            .into_diagnostic()?,
        )
    };

    let metrics = CounterMetrics::new();
    let dispatcher = Arc::new(BatchDispatcher::new(
        Arc::new(InMemoryBatchStore::new()),
        Arc::new(Forwarder::new(channel, config.retry.clone())),
        Arc::new(metrics.clone()),
        config.dispatcher.clone(),
    ));

    let handles: Vec<_> = batches
        .into_iter()
        .map(|batch| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.submit(batch).await })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle.await.into_diagnostic()?.into_diagnostic()?;
        results.push(result);
    }

    let mut missing = Vec::new();
    for batch_id in &cli.lookup {
        match dispatcher.get_batch_results(batch_id).await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!(batch_id = %batch_id, error = %e, "Lookup failed");
                missing.push(batch_id.clone());
            }
        }
    }

    write_results(cli.format, &results)?;

    tracing::info!(
        success = metrics.successes(),
        failure = metrics.failures(),
        "Dispatch finished"
    );

    if !missing.is_empty() {
        return Err(miette::miette!("Batch not found: {}", missing.join(", ")));
    }
    Ok(())
}
