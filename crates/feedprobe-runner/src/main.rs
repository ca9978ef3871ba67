//! feedprobe -- black-box activity-feed verification for Sling-style
//! content servers.
//!
//! Usage:
//!   feedprobe                          # Run all scenarios with default config
//!   feedprobe --config probe.toml run --scenario content-activity
//!   feedprobe check                    # Verify credentials against the server
//!   feedprobe feed <pool-id>           # Fetch one activity feed, pretty-printed

use std::path::Path;

use clap::{Parser, Subcommand};

use feedprobe_client::SessionClient;
use feedprobe_runner::config::ProbeConfig;
use feedprobe_runner::scenarios;

#[derive(Parser)]
#[command(name = "feedprobe", about = "Black-box activity feed verification")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "feedprobe.toml")]
    config: String,

    /// Override the server base URL from the config
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios (default)
    Run {
        /// Only run the named scenario
        #[arg(long)]
        scenario: Option<String>,
    },
    /// List available scenarios
    Scenarios,
    /// Check server reachability and credentials
    Check,
    /// Fetch the activity feed for a pool id and pretty-print it
    Feed {
        /// Pool id of the content (or comment) to inspect
        pool_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "feedprobe=info,feedprobe_runner=info,feedprobe_verifier=info,feedprobe_client=info"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = ProbeConfig::load_or_default(Path::new(&cli.config))?;
    if let Some(base_url) = cli.base_url {
        cfg.server.base_url = base_url;
    }

    match cli.command {
        Some(Commands::Scenarios) => {
            for name in scenarios::SCENARIOS {
                println!("{name}");
            }
        }
        Some(Commands::Check) => {
            let client = admin_client(&cfg)?;
            let who = client.whoami().await?;
            println!("authenticated against {} as {}", cfg.server.base_url, who);
        }
        Some(Commands::Feed { pool_id }) => {
            let client = admin_client(&cfg)?;
            let feed = client
                .activity_feed(&feedprobe_activity::pool_path(&pool_id), None)
                .await?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
        }
        Some(Commands::Run { scenario }) => {
            run_scenarios(&cfg, scenario.as_deref()).await?;
        }
        None => {
            run_scenarios(&cfg, None).await?;
        }
    }

    Ok(())
}

fn admin_client(cfg: &ProbeConfig) -> anyhow::Result<SessionClient> {
    Ok(SessionClient::with_timeout(
        &cfg.server.base_url,
        cfg.server.admin(),
        cfg.server.request_timeout(),
    )?)
}

async fn run_scenarios(cfg: &ProbeConfig, only: Option<&str>) -> anyhow::Result<()> {
    let policy = cfg.convergence.policy();
    let selected: Vec<&str> = match only {
        Some(name) => vec![name],
        None => scenarios::SCENARIOS.to_vec(),
    };

    tracing::info!(
        server = %cfg.server.base_url,
        scenarios = selected.len(),
        started = %chrono::Utc::now().to_rfc3339(),
        "starting run"
    );

    let mut failures = 0usize;
    for name in selected {
        // Each scenario gets its own session; nothing is shared across runs.
        let mut client = admin_client(cfg)?;
        let started = std::time::Instant::now();
        let result = match name {
            "content-activity" => scenarios::content_activity(&mut client, &policy).await,
            "content-update-and-comment" => {
                scenarios::content_update_and_comment(&mut client, &policy).await
            }
            other => {
                anyhow::bail!("unknown scenario '{other}' (try: feedprobe scenarios)");
            }
        };
        let elapsed = started.elapsed();
        match result {
            Ok(()) => println!("PASS {name} ({:.1}s)", elapsed.as_secs_f64()),
            Err(e) => {
                failures += 1;
                println!("FAIL {name} ({:.1}s): {e}", elapsed.as_secs_f64());
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} scenario(s) failed");
    }
    Ok(())
}
