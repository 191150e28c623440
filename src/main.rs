use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use planner_calendar::reader;
use planner_calendar::{
    AggregatorOptions, DateRange, EventAggregator, EventOrdering, FailurePolicy,
    HomeAssistantClient, RetrievalStrategy, SourceSet, StateStore,
};
use planner_core::ConfigError;

/// Print the events a planner calendar card would show for a date window.
#[derive(Debug, Parser)]
#[command(name = "planner", version)]
struct Cli {
    /// Start of the window (passed to Home Assistant verbatim)
    start: String,

    /// End of the window, exclusive
    end: String,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Calendar entity to include; repeat to override the configured list
    #[arg(long = "entity")]
    entities: Vec<String>,

    /// Read events from resident entity state instead of the calendar API
    #[arg(long)]
    local: bool,

    /// Abort on the first calendar that fails to load
    #[arg(long)]
    fail_fast: bool,

    /// Sort events by start
    #[arg(long)]
    chronological: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    planner_core::init()?;

    let cli = Cli::parse();
    let (config, _) = planner_core::Config::load_validated(cli.config.as_deref()).map_err(|e| {
        if let Some(config_err) = e.downcast_ref::<ConfigError>() {
            tracing::error!("{}", config_err.user_message());
        }
        e
    })?;

    let mut options = AggregatorOptions::from(&config.card);
    if cli.fail_fast {
        options.failure_policy = FailurePolicy::FailFast;
    }
    if cli.chronological {
        options.ordering = EventOrdering::Chronological;
    }
    let strategy = if cli.local {
        RetrievalStrategy::Local
    } else {
        config.card.strategy
    };

    let sources = if cli.entities.is_empty() {
        SourceSet::new(config.card.entities.iter().cloned())
    } else {
        SourceSet::new(cli.entities)
    };

    let client = Arc::new(
        HomeAssistantClient::from_config(&config.home_assistant)
            .context("Failed to create Home Assistant client")?,
    );

    let store = Arc::new(StateStore::new());
    if strategy == RetrievalStrategy::Local {
        let states = client
            .fetch_states()
            .await
            .context("Failed to load entity states")?;
        store.replace_all(states);
        tracing::info!("Loaded {} entity states", store.len());
    }

    let aggregator =
        EventAggregator::new(reader::for_strategy(strategy, client, store)).with_options(options);

    let range = DateRange::new(cli.start, cli.end);
    let events = aggregator
        .fetch_events(&sources, &range)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.user_message(), e))?;

    tracing::info!("Fetched {} events from {} calendars", events.len(), sources.len());
    println!("{}", serde_json::to_string_pretty(&events)?);

    Ok(())
}
