//! States Sandbox - command line front end
//!
//! Thin presentation layer: every command prints what the session, the
//! metric registry, or the turn client produced.

use clap::{Parser, Subcommand};
use states_sandbox::api::{CredentialStore, Session, TurnReport};
use states_sandbox::core::config::{self, ClientConfig};
use states_sandbox::core::error::{Result, SandboxError};
use states_sandbox::core::types::StateId;
use states_sandbox::metrics::format::format_compact;
use states_sandbox::metrics::registry::MetricRegistry;
use states_sandbox::snapshot::nation::Nation;
use states_sandbox::snapshot::ranking::{owned_by, Ranked, RankingEngine, RankingWindow};
use states_sandbox::turn::event::TurnEvent;
use states_sandbox::turn::progress::TurnProgress;
use states_sandbox::turn::request::{TurnRequest, POLICY_QUESTIONS};
use states_sandbox::turn::PendingTurn;
use std::path::PathBuf;
use tokio::runtime::Runtime;

/// Play an LLM-simulated nation from the terminal
#[derive(Parser, Debug)]
#[command(name = "states-sandbox")]
#[command(about = "Found nations, play turns, and compare them on the leaderboard")]
struct Cli {
    /// TOML config file (defaults plus SANDBOX_* environment otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a bearer token
    Login { token: String },
    /// Forget the stored token
    Logout,
    /// List your nations
    Nations,
    /// Latest snapshot of one nation
    Show { id: i64 },
    /// Metric history of one nation
    History {
        id: i64,
        #[arg(long, default_value = "gdp")]
        metric: String,
    },
    /// Rank every nation by a metric
    Leaderboard {
        #[arg(long, default_value = "gdp")]
        metric: String,
        /// Rows kept at each end of the table
        #[arg(long)]
        edge: Option<usize>,
    },
    /// Play one turn with a policy
    Play { id: i64, policy: String },
    /// Found a nation; ten comma-separated answers from 1 to 5
    Found {
        name: String,
        #[arg(long, value_delimiter = ',')]
        answers: Vec<u8>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("states_sandbox=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut client_config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::from_env(),
    };
    if let Some(url) = cli.api_url {
        client_config.api_url = url;
    }
    client_config.validate()?;
    if config::set_config(client_config).is_err() {
        tracing::warn!("Config already initialised");
    }

    let rt = Runtime::new()?;
    match rt.block_on(run(cli.command, config::config().clone())) {
        Err(e) if e.is_auth() => {
            eprintln!("Not signed in: {}", e);
            eprintln!("Run `states-sandbox login <token>` to store a credential.");
            std::process::exit(2);
        }
        other => other,
    }
}

async fn run(command: Command, config: ClientConfig) -> Result<()> {
    match command {
        Command::Login { token } => {
            let mut store = CredentialStore::load(config.credentials_path.clone())?;
            store.set_token(&token)?;
            let session = Session::start(config).await?;
            if let Some(user) = session.user() {
                println!("Signed in as {}", user.username.as_deref().unwrap_or("(unnamed)"));
            }
            Ok(())
        }
        Command::Logout => {
            let mut store = CredentialStore::load(config.credentials_path.clone())?;
            store.invalidate()?;
            println!("Signed out.");
            Ok(())
        }
        Command::Nations => {
            let mut session = Session::start(config).await?;
            let nations = session.refresh().await?;
            if nations.is_empty() {
                println!("No nations yet. Found one with `states-sandbox found`.");
            }
            for nation in nations.iter() {
                let date = nation
                    .series
                    .latest()
                    .map(|s| s.date.month_label())
                    .unwrap_or_else(|| "no snapshot".into());
                println!("{:>6}  {:<32} {}", nation.id, nation.display_name(), date);
            }
            Ok(())
        }
        Command::Show { id } => {
            let mut session = Session::start(config).await?;
            let nation = session.load_history(StateId(id)).await?;
            print_nation(nation)
        }
        Command::History { id, metric } => {
            let mut session = Session::start(config).await?;
            let nation = session.load_history(StateId(id)).await?;
            let definition = MetricRegistry::global().definition(&metric)?;
            println!("{}: {}", nation.display_name(), definition.name);
            for (date, value) in nation.series.chart_points(&metric)? {
                println!("  {:<10} {:>10}", date.month_label(), format_compact(value));
            }
            println!("Change since last turn: {}", nation.series.percent_change(&metric)?);
            Ok(())
        }
        Command::Leaderboard { metric, edge } => {
            let edge = edge.unwrap_or(config.leaderboard_edge);
            let session = Session::start(config).await?;
            let registry = MetricRegistry::global();
            let nations = session.api().latest_snapshots(&registry.required_paths()).await?;
            let ranked = RankingEngine::new(registry).rank(&nations, &metric)?;

            let window = RankingWindow::new(&ranked, edge);
            for row in window.top {
                print_row(registry, row, &metric)?;
            }
            if window.has_gap() {
                println!("   ... {} more ...", window.elided);
            }
            for row in window.bottom {
                print_row(registry, row, &metric)?;
            }

            if let Some(user) = session.user() {
                let own = owned_by(&ranked, user.id);
                if !own.is_empty() {
                    println!("\nYour states");
                    for row in own {
                        print_row(registry, row, &metric)?;
                    }
                }
            }
            Ok(())
        }
        Command::Play { id, policy } => {
            let mut session = Session::start(config).await?;
            session.load_history(StateId(id)).await?;
            let pending = session.begin_turn(TurnRequest::play(StateId(id), policy))?;
            let report = stream_turn(&mut session, pending).await?;
            if report.outcome.is_success() {
                if let Some(nation) = session.nations().get(StateId(id)) {
                    print_nation(nation)?;
                }
            }
            Ok(())
        }
        Command::Found { name, answers } => {
            if answers.len() != POLICY_QUESTIONS.len() {
                for (i, question) in POLICY_QUESTIONS.iter().enumerate() {
                    println!("{:>2}. {}", i + 1, question);
                }
                return Err(SandboxError::InvalidRequest(format!(
                    "answer all {} questions with --answers",
                    POLICY_QUESTIONS.len()
                )));
            }
            let request = TurnRequest::create(&name, &answers)?;
            let mut session = Session::start(config).await?;
            let pending = session.begin_turn(request)?;
            let report = stream_turn(&mut session, pending).await?;
            if let Some(id) = report.outcome.created_state() {
                println!("Founded state {}", id);
            }
            Ok(())
        }
    }
}

/// Run a claimed turn with live status output; Ctrl-C cancels it
async fn stream_turn(session: &mut Session, pending: PendingTurn) -> Result<TurnReport> {
    let cancel = pending.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let progress = TurnProgress::start(session.config().expected_turn_duration());
    let mut observer = |event: &TurnEvent| match event {
        TurnEvent::Status { message } => {
            println!("[{} {:>3.0}%] {}", progress.format_elapsed(), progress.fraction() * 100.0, message)
        }
        TurnEvent::Error(error) => eprintln!("! {}", error.message),
        _ => {}
    };
    let result = session.run_turn(pending, &mut observer).await;
    ctrl_c.abort();
    let report = result?;

    if let Some(text) = &report.report {
        println!("\n{}\n", text);
    }
    if !report.outcome.is_success() {
        println!(
            "Turn ended without confirmation ({:?}); refresh later to see whether it went through.",
            report.outcome.end
        );
    }
    if let Some(redirect) = &report.redirect {
        println!("Out of credits. Opening {} ...", session.api().url(&redirect.target));
        tokio::time::sleep(redirect.delay).await;
        println!("Buy more at {}", session.api().url(&redirect.target));
    }
    Ok(report)
}

fn print_nation(nation: &Nation) -> Result<()> {
    println!("{} (state {})", nation.display_name(), nation.id);
    if let Some(government) = nation.government_type() {
        println!("  Government: {}", government);
    }
    let Some(latest) = nation.series.latest() else {
        println!("  No snapshots yet.");
        return Ok(());
    };
    println!("  As of {}", latest.date.month_label());

    let registry = MetricRegistry::global();
    for metric in registry.iter() {
        println!(
            "  {:<24} {:>24} {:>10}",
            metric.name,
            registry.display_value(&latest.document, metric.id)?,
            nation.series.percent_change(metric.id)?
        );
    }
    for event in &latest.events {
        println!("  Upcoming: {}", event);
    }
    Ok(())
}

fn print_row(registry: &MetricRegistry, row: &Ranked<'_, Nation>, metric: &str) -> Result<()> {
    let shown = match row.entity.series.latest() {
        Some(snapshot) => registry.display_value(&snapshot.document, metric)?,
        None => String::new(),
    };
    println!("{:>4}. {:<32} {:>20}", row.rank, row.entity.display_name(), shown);
    Ok(())
}
