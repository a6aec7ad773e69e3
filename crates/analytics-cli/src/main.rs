mod logging;
mod simulated;

use std::path::PathBuf;
use std::time::Duration;

use analytics_core::{
    source, Analytics, AnalyticsConfig, BotSource, MemberBuckets, PointInTime, StatsBuffer,
};
use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::time::Instant;

use crate::simulated::{SimEvent, SimulatedBot};

#[derive(Parser)]
#[command(name = "analytics-cli")]
#[command(about = "Drive the Discord analytics client with a simulated bot")]
#[command(version)]
struct Cli {
    /// API token of the bot on the analytics dashboard
    #[arg(long, env = "DISCORD_ANALYTICS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long)]
    api_base: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Flush every 30 seconds instead of every 5 minutes
    #[arg(long, default_value = "false")]
    dev: bool,

    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize against the API and feed it random traffic
    Simulate {
        /// Number of guilds the simulated bot starts with
        #[arg(long, default_value_t = 25)]
        guilds: usize,
        /// Milliseconds between two simulated events
        #[arg(long, default_value_t = 250)]
        rate: u64,
        /// Stop after this many seconds; runs until Ctrl-C otherwise
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Print the payload for synthetic interactions without contacting the API
    Preview {
        #[arg(long, default_value_t = 20)]
        interactions: usize,
        #[arg(long, default_value_t = 10)]
        guilds: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug);

    match &cli.command {
        Commands::Simulate {
            guilds,
            rate,
            duration,
        } => {
            let config = load_config(&cli)?;
            simulate(config, *guilds, *rate, *duration).await
        }
        Commands::Preview {
            interactions,
            guilds,
        } => preview(*interactions, *guilds).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalyticsConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalyticsConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AnalyticsConfig::from_env(),
    };
    if let Some(api_key) = &cli.api_key {
        config.api_key = api_key.clone();
    }
    if let Some(api_base) = &cli.api_base {
        config.api_base = api_base.clone();
    }
    config.dev_mode |= cli.dev;
    config.debug |= cli.debug;
    Ok(config)
}

async fn simulate(
    config: AnalyticsConfig,
    guilds: usize,
    rate_ms: u64,
    duration_secs: Option<u64>,
) -> anyhow::Result<()> {
    let bot = SimulatedBot::new(guilds);
    let analytics = Analytics::new(config, bot.clone()).context("invalid configuration")?;
    analytics
        .initialize()
        .await
        .context("analytics initialization failed")?;

    let deadline = duration_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut ticker = tokio::time::interval(Duration::from_millis(rate_ms.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let votes = analytics.events("votes")?;

    info!(
        "simulating {} guilds, one event every {}ms, flushing every {:?}",
        guilds,
        rate_ms,
        analytics.config().flush_interval()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        match bot.next_event() {
            SimEvent::Interaction(descriptor) => analytics.record_interaction(&descriptor)?,
            SimEvent::GuildJoin => analytics.record_guild_join(),
            SimEvent::GuildLeave => analytics.record_guild_leave(),
            SimEvent::Vote => {
                votes.increment()?;
            }
        }
    }

    // Deliver what is left instead of waiting for the next tick.
    if let Err(e) = analytics.flush().await {
        warn!("final flush failed: {}", e);
    }
    Ok(())
}

async fn preview(interactions: usize, guilds: usize) -> anyhow::Result<()> {
    let bot = SimulatedBot::new(guilds);
    let known_guilds = bot.guilds();
    let mut buffer = StatsBuffer::new(Utc::now().date_naive());

    {
        let mut rng = rand::thread_rng();
        for _ in 0..interactions {
            let descriptor = bot.random_interaction(&mut rng);
            let name = descriptor.name.clone();
            buffer.record_interaction(&descriptor, name, &known_guilds, Utc::now());
        }
    }

    buffer.refresh(PointInTime {
        guilds: source::guild_count(&known_guilds),
        users: source::member_count(&known_guilds),
        guild_members: MemberBuckets::from_member_counts(
            known_guilds.iter().map(|g| g.member_count),
        ),
        user_install_count: bot.user_install_count().await,
    });

    let payload = buffer.snapshot().to_payload();
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
