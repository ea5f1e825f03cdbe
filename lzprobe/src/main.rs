use clap::Parser;
use lzprobe::config::{Args, ProbeCommand};
use lzprobe::credentials::DeviceCodeCredential;
use lzprobe::probes::score::ScoreOptions;
use lzprobe::probes::storage::StorageOptions;
use lzprobe::{Config, probes, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before anything else that might build a TLS client
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Parse CLI args
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, check every section and exit
    if args.validate {
        config.validate()?;
        println!("Configuration is valid.");
        return Ok(());
    }

    // Initialize telemetry (stderr, RUST_LOG-controlled)
    telemetry::init_telemetry()?;

    tracing::debug!("{:?}", args);

    let Some(probe) = args.probe else {
        anyhow::bail!("no probe selected; run with --help to see the available probes");
    };

    let report = match probe {
        ProbeCommand::Secret { name } => {
            let credential = DeviceCodeCredential::new(&config.identity, config.request_timeout)?;
            probes::secret::run(&config, &credential, name.as_deref()).await?
        }
        ProbeCommand::Storage { read_only, limit } => {
            let credential = DeviceCodeCredential::new(&config.identity, config.request_timeout)?;
            probes::storage::run(&config, &credential, StorageOptions { read_only, limit }).await?
        }
        ProbeCommand::Sql { target } => {
            let credential = DeviceCodeCredential::new(&config.identity, config.request_timeout)?;
            probes::sql::run(&config, &credential, &target).await?
        }
        ProbeCommand::Model { package_only } => {
            let credential = DeviceCodeCredential::new(&config.identity, config.request_timeout)?;
            probes::model::run(&config, &credential, package_only).await?
        }
        ProbeCommand::Score { query, context, uri } => {
            probes::score::run(&config, ScoreOptions { query, context, uri }).await?
        }
    };

    // The report is the probe's output: raw JSON on stdout, logs on stderr
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}
