use clap::Parser;
use solar_summary::aggregate::{AggregationSettings, DailyAggregator, MonthlyAggregator, RunSummary};
use solar_summary::api::{self, AppState};
use solar_summary::auth::build_identity;
use solar_summary::auth::jwt::create_token;
use solar_summary::cli::{Cli, Command};
use solar_summary::config::Config;
use solar_summary::db;
use solar_summary::store::{PgStore, SummaryStore};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, anyhow::Error> {
    info!("Starting solar-summary");

    let cfg = Config::load(&cli.config)?;
    info!(path = %cli.config.display(), "Configuration loaded");

    if let Command::Token { subject, hours } = &cli.command {
        return issue_token(&cfg, subject, *hours);
    }

    let settings = Arc::new(AggregationSettings::from_config(&cfg.aggregation)?);
    // Bad windows fail before any database work
    let window = cli.command.daily_window(&settings)?;

    let pool = db::connect(&cfg.database).await?;
    db::ensure_schema(&pool).await?;
    info!("Connected to database");
    let store: Arc<dyn SummaryStore> = Arc::new(PgStore::new(pool));

    match (cli.command, window) {
        (Command::Daily { .. } | Command::Backfill { .. }, Some(window)) => {
            let aggregator = DailyAggregator::new(store, settings);
            let result = aggregator.run(&window, chrono::Utc::now()).await;
            Ok(finish(result.map(|report| report.summary())))
        }
        (Command::Monthly, _) => {
            let aggregator = MonthlyAggregator::new(store, settings);
            let result = aggregator.run().await;
            Ok(finish(result.map(|report| report.summary())))
        }
        (Command::Serve, _) => {
            serve(&cfg, store, settings).await?;
            Ok(ExitCode::SUCCESS)
        }
        (command, _) => Err(anyhow::anyhow!("nothing to run for {:?}", command)),
    }
}

fn issue_token(cfg: &Config, subject: &str, hours: u32) -> Result<ExitCode, anyhow::Error> {
    let auth = cfg
        .auth
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("auth section is required to issue tokens"))?;
    let secret = auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("auth.jwt_secret is required to issue tokens"))?;
    if !auth.users.iter().any(|u| u.id == subject) {
        warn!(subject, "subject is not listed under auth.users");
    }

    let token = create_token(subject, secret, chrono::Duration::hours(i64::from(hours)))?;
    info!(subject, hours, "issued local token");
    println!("{}", token);
    Ok(ExitCode::SUCCESS)
}

/// Print the one-line job result and map it to the scheduler's exit code.
fn finish(result: Result<RunSummary, solar_summary::error::AppError>) -> ExitCode {
    let (summary, code) = match result {
        Ok(summary) if summary.ok => (summary, ExitCode::SUCCESS),
        Ok(summary) => (summary, ExitCode::from(EXIT_PARTIAL)),
        Err(e) => {
            error!(error = %e, "job could not run");
            (RunSummary::fatal(e.to_string()), ExitCode::FAILURE)
        }
    };
    match serde_json::to_string(&summary) {
        Ok(line) => println!("{}", line),
        Err(e) => error!(error = %e, "failed to encode job summary"),
    }
    code
}

async fn serve(
    cfg: &Config,
    store: Arc<dyn SummaryStore>,
    settings: Arc<AggregationSettings>,
) -> Result<(), anyhow::Error> {
    let auth = cfg
        .auth
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("auth section is required to serve the API"))?;
    let identity = build_identity(auth).await?;

    let state = AppState {
        store,
        identity,
        settings,
        admin_role: auth.admin_role.clone(),
    };
    let router = api::create_router(state);
    let addr = format!("{}:{}", cfg.api.host, cfg.api.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("API server listening on {}", addr);

    let serve = axum::serve(listener, router);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
        }
        info!("Shutdown signal received");
    };

    if let Err(e) = serve.with_graceful_shutdown(shutdown).await {
        error!(error = %e, "API server error");
    }

    info!("Application shutdown complete");
    Ok(())
}
