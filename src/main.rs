use anyhow::{Context, Result};
use async_processor::config::DEFAULT_CONFIG_PATH;
use async_processor::logging::{self, LogFormat};
use async_processor::{
    telemetry, ExitPolicy, ExitStatus, Orchestrator, ProcessorConfig, ShutdownSignal, SignalSource,
};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, Instrument};

#[derive(Parser, Debug)]
#[command(name = "async-processor")]
#[command(about = "Asynchronous event processor with health and metrics endpoints")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, help = "Path to optional TOML configuration file")]
    config: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json, value_name = "FORMAT")]
    log_format: LogFormat,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit without starting the service")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.print_config {
        return match print_default_config() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("FATAL: {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match ProcessorConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: failed to load configuration: {}", e);
            return ExitStatus::Failure.into();
        }
    };

    if args.validate_config {
        println!("✓ Configuration is valid");
        return ExitStatus::Success.into();
    }

    match run(config, args.log_format).await {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            ExitStatus::Failure.into()
        }
    }
}

async fn run(config: ProcessorConfig, log_format: LogFormat) -> Result<ExitStatus> {
    let _log_guard =
        logging::init(&config.log_level, log_format).context("failed to initialise logging")?;

    serve(config).instrument(logging::service_span()).await
}

async fn serve(config: ProcessorConfig) -> Result<ExitStatus> {
    let instance_id = uuid::Uuid::new_v4().to_string();
    logging::log_startup_banner(
        &config.service_version,
        &config.nats_url,
        config.http_port,
        &instance_id,
    );

    let metrics = telemetry::install().context("failed to install metrics recorder")?;

    let shutdown = ShutdownSignal::new();
    let signals = SignalSource::os(config.repeat_signal).spawn(shutdown.clone());

    let orchestrator = Orchestrator::for_service(&config, shutdown, metrics);
    info!(
        components = ?orchestrator.component_names(),
        shutdown_timeout_secs = config.shutdown_timeout_secs,
        "Service assembled"
    );

    let report = orchestrator.run().await;
    signals.abort();

    report.log_summary();
    let status = ExitPolicy::evaluate(&report);
    if status.is_success() {
        info!("service stopped");
    } else {
        error!(exit_code = status.code(), "service stopped with failure");
    }

    Ok(status)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let rendered = toml::to_string_pretty(&ProcessorConfig::default())
        .context("failed to render default configuration")?;

    println!("# Async processor configuration");
    println!("# Every key can be overridden by the upper-case environment variable of the same name");
    println!("# nats_url is required and has no default");
    println!();
    println!("{}", rendered);
    Ok(())
}
