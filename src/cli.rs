use crate::aggregate::{AggregationSettings, DailyWindow};
use crate::error::AppError;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Daily and monthly solar generation rollups.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, value_name = "FILE", env = "APP_CONFIG", default_value = "config/config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Summarize yesterday (or an explicit date range) for every device.
    Daily {
        /// Also finalize today once the local cutoff has passed.
        #[arg(long)]
        include_today: bool,
        #[arg(long, value_name = "YYYY-MM-DD", requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long, value_name = "YYYY-MM-DD", requires = "from")]
        to: Option<NaiveDate>,
    },
    /// Recompute the trailing N days, filling gaps and late data.
    Backfill {
        /// Defaults to `aggregation.backfill_days`.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,
    },
    /// Rebuild every month from the daily summaries.
    Monthly,
    /// Run the HTTP API.
    Serve,
    /// Print an HS256 bearer token for a local user (needs `auth.jwt_secret`).
    Token {
        /// Subject id, as listed under `auth.users`.
        subject: String,
        /// Token lifetime in hours.
        #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(1..=8760))]
        hours: u32,
    },
}

impl Command {
    /// The date window a daily or backfill run covers, checked against the
    /// configured limit. `None` for the other subcommands.
    pub fn daily_window(
        &self,
        settings: &AggregationSettings,
    ) -> Result<Option<DailyWindow>, AppError> {
        let window = match *self {
            Command::Daily {
                include_today,
                from,
                to,
            } => match (from, to) {
                (Some(from), Some(to)) => DailyWindow::Range { from, to },
                _ => DailyWindow::Yesterday { include_today },
            },
            Command::Backfill { days } => DailyWindow::Trailing {
                days: days.unwrap_or(settings.backfill_days),
            },
            _ => return Ok(None),
        };
        window.check(settings.max_window_days)?;
        Ok(Some(window))
    }
}
