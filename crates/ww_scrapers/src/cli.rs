use clap::Subcommand;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use ww_core::{HttpFetcher, RelevanceScorer, Result, SharedConfig};

use crate::extract::ContentExtractor;
use crate::manager::{plan_sources, Pipeline, Politeness, RunOutcome};

/// Durations such as `90s`, `45m`, `1h30m` or `1d`. A bare number means seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let scale = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds += num * scale;
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        if !current_number.is_empty() {
            total_seconds += current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }
        if total_seconds == 0 {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ScraperCommands {
    /// Run the ingestion pipeline once, or forever with --interval
    Scrape {
        /// Repeat with this pause between runs (e.g. 30m, 1h, 1h30m)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// List every enabled source in run order
    Sources,
    /// Print the body text extracted from one article url
    Extract { url: String },
}

pub async fn handle_command(
    command: ScraperCommands,
    pipeline: &Pipeline,
    config: &SharedConfig,
    fetcher: Arc<dyn HttpFetcher>,
) -> Result<()> {
    match command {
        ScraperCommands::Scrape { interval: None } => {
            print_outcome(&pipeline.run().await?);
        }
        ScraperCommands::Scrape {
            interval: Some(HumanDuration(every)),
        } => {
            info!(seconds = every.as_secs(), "Running in periodic mode");
            loop {
                match pipeline.run().await {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(e) => error!(error = %e, "Scrape failed"),
                }
                info!("Waiting {}s before next scrape", every.as_secs());
                tokio::time::sleep(every).await;
            }
        }
        ScraperCommands::Sources => {
            let config = config.read().await.clone();
            let planned = plan_sources(&config, fetcher, &RelevanceScorer::default(), &Politeness::default())?;
            for planned in planned {
                println!("{:<12} {}", planned.source.kind(), planned.source.target());
            }
        }
        ScraperCommands::Extract { url } => {
            let content = ContentExtractor::new(fetcher).extract_content(&url).await;
            if content.is_empty() {
                println!("(no readable content)");
            } else {
                println!("{}", content);
            }
        }
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(summary) => {
            println!("Found {} relevant, {} new", summary.found, summary.new);
            for err in &summary.errors {
                println!("  ! {}", err);
            }
        }
        RunOutcome::Skipped => println!("A scrape is already running"),
    }
}
