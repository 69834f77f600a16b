use std::{process::ExitCode, sync::Arc};

use clap::{Args, Parser, Subcommand};
use engine::{
    Ledger, LedgerCache,
    sinks::{InfluxStore, RelationalSink, publish_points, relational},
    spawn_refresher,
};
use tokio_util::sync::CancellationToken;

use error::{AppError, Result};
use settings::{DEFAULT_CONFIG_PATH, Mode, Settings};

mod error;
mod settings;

#[derive(Parser, Debug)]
#[command(
    name = "ledgersync",
    about = "Publish a ledger register to SQL, InfluxDB or HTTP"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sync, or serve, according to the configured mode.
    Run(RunArgs),
    /// Print the version and exit.
    Version,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path of the configuration file
    #[arg(long, env = "LEDGERSYNC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Overrides `mode` from the configuration file
    #[arg(long, value_enum)]
    mode: Option<Mode>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let args = match cli.command {
        Command::Version => {
            println!("ledgersync {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Command::Run(args) => args,
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("ledgersync: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut settings = Settings::new(&args.config)?;
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledgersync={level},engine={level},server={level}",
            level = settings.log_level
        ))
        .init();

    let ledger = build_ledger(&settings);

    match settings.mode {
        Mode::Relational => sync_relational(&settings, &ledger).await,
        Mode::TimeSeries => sync_time_series(&settings, &ledger).await,
        Mode::Serve => serve(&settings, ledger).await,
    }
}

fn build_ledger(settings: &Settings) -> Ledger {
    let mut builder = Ledger::builder()
        .binary(&settings.ledger.binary)
        .data_dir(&settings.ledger.data_dir)
        .timeout(settings.timeouts.command());
    if let Some(file) = &settings.ledger.data_file {
        builder = builder.data_file(file);
    }
    builder.build()
}

async fn sync_relational(settings: &Settings, ledger: &Ledger) -> Result<()> {
    let database = settings
        .database
        .as_ref()
        .ok_or(AppError::MissingSetting("database"))?;
    let url = database.url()?;

    let transactions = ledger.load().await?;
    let db = relational::connect(&url).await?;
    let rows = RelationalSink::new(db)
        .timeout(settings.timeouts.database())
        .publish(&transactions)
        .await?;

    tracing::info!("relational sync done: {rows} rows live");
    Ok(())
}

async fn sync_time_series(settings: &Settings, ledger: &Ledger) -> Result<()> {
    let influx = settings
        .influx
        .as_ref()
        .ok_or(AppError::MissingSetting("influx"))?;

    let transactions = ledger.load().await?;
    let store = InfluxStore::new(
        reqwest::Client::new(),
        &influx.url,
        &influx.token,
        &influx.org,
        &influx.bucket,
    )
    .measurement(&influx.measurement)
    .timeout(settings.timeouts.time_series());
    let written = publish_points(&store, &transactions).await?;

    tracing::info!("time-series sync done: {written} new points");
    Ok(())
}

async fn serve(settings: &Settings, ledger: Ledger) -> Result<()> {
    let cache = Arc::new(LedgerCache::new(Arc::new(ledger)));
    let shutdown = CancellationToken::new();

    let listener = tokio::net::TcpListener::bind(settings.server.bind()).await?;
    let refresher = spawn_refresher(
        cache.clone(),
        settings.server.refresh_interval(),
        shutdown.clone(),
    );

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutting down");
                    shutdown.cancel();
                }
                Err(err) => tracing::error!("failed to listen for ctrl-c: {err}"),
            }
        }
    });

    let served =
        server::run_with_listener(cache, &settings.server.static_dir, listener, shutdown.clone())
            .await;

    shutdown.cancel();
    refresher.await?;
    served?;
    Ok(())
}
