mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    ActionResult, ControlIntent, ControlKind, FleetEvent, FleetState, PlantClient, SeriesMetric,
    SeriesView,
};
use shared::domain::ReactorId;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Monitor and control a reactor plant")]
struct Cli {
    /// Reactor service base URL.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll continuously and print every update until interrupted.
    Watch {
        /// Chart one reactor's temperature instead of the fleet average.
        #[arg(long)]
        reactor: Option<String>,
        /// Exit after this many fleet updates.
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Poll once and print the fleet.
    Status,
    Control {
        action: Action,
        /// Target one reactor; omit to act on the whole fleet.
        #[arg(long)]
        reactor: Option<String>,
        #[arg(long)]
        steps: Option<u32>,
    },
    RenamePlant {
        name: String,
    },
    RenameReactor {
        id: String,
        name: String,
    },
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Action {
    ControlledShutdown,
    EmergencyShutdown,
    Start,
    /// Shuts an active reactor down, starts any other.
    Power,
    ToggleCoolant,
    Refuel,
    RaiseRods,
    DropRods,
}

impl Action {
    fn kind(self, fleet: &FleetState, reactor: Option<&ReactorId>) -> ControlKind {
        match self {
            Self::ControlledShutdown => ControlKind::ControlledShutdown,
            Self::EmergencyShutdown => ControlKind::EmergencyShutdown,
            Self::Start => ControlKind::StartReactor,
            Self::Power => {
                let active = reactor
                    .and_then(|id| fleet.get(id))
                    .map(|snapshot| snapshot.state.is_active())
                    .unwrap_or(false);
                if active {
                    ControlKind::ControlledShutdown
                } else {
                    ControlKind::StartReactor
                }
            }
            Self::ToggleCoolant => ControlKind::ToggleCoolant,
            Self::Refuel => ControlKind::Refuel,
            Self::RaiseRods => ControlKind::RaiseRods,
            Self::DropRods => ControlKind::DropRods,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::load_settings();
    if let Some(url) = cli.api_url {
        settings.api_url = url;
    }
    if let Some(key) = cli.api_key {
        settings.api_key = key;
    }
    if let Some(interval) = cli.poll_interval_ms {
        settings.poll_interval_ms = interval;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if settings.api_key.is_empty() {
        warn!("no API key configured; set REACTOR_API_KEY or pass --api-key");
    }

    let metric = match &cli.command {
        Command::Watch {
            reactor: Some(id), ..
        } => SeriesMetric::ReactorTemperature(ReactorId::new(id.as_str())),
        _ => SeriesMetric::FleetAverageTemperature,
    };
    let client = PlantClient::connect(settings.into_client_config(metric))
        .context("failed to configure reactor service client")?;

    match cli.command {
        Command::Watch { ticks, .. } => watch(&client, ticks).await?,
        Command::Status => {
            let fleet = client.poll_once().await.context("failed to poll the plant")?;
            print_fleet(&fleet);
        }
        Command::Control {
            action,
            reactor,
            steps,
        } => {
            let fleet = client.poll_once().await.context("failed to poll the plant")?;
            let reactor = reactor.map(ReactorId::new);
            let kind = action.kind(&fleet, reactor.as_ref());
            let mut intent = match reactor {
                Some(id) => ControlIntent::reactor(id, kind),
                None => ControlIntent::fleet(kind),
            };
            if let Some(steps) = steps {
                intent = intent.with_steps(steps);
            }
            let results = client.execute(intent).await;
            print_results(&results);
            let failed = results.iter().filter(|r| !r.is_success()).count();
            if failed > 0 {
                bail!("{failed} of {} actions failed", results.len());
            }
        }
        Command::RenamePlant { name } => {
            client
                .rename_plant(&name)
                .await
                .context("failed to rename plant")?;
            println!("plant renamed to {}", name.trim());
        }
        Command::RenameReactor { id, name } => {
            let id = ReactorId::new(id);
            client
                .rename_reactor(&id, &name)
                .await
                .with_context(|| format!("failed to rename reactor {id}"))?;
            println!("reactor {id} renamed to {}", name.trim());
        }
        Command::Reset => {
            client.reset_plant().await.context("failed to reset plant")?;
            println!("plant reset");
        }
    }

    Ok(())
}

async fn watch(client: &PlantClient, ticks: Option<u64>) -> Result<()> {
    let mut events = client.subscribe_events();
    client
        .start_polling()
        .await
        .context("failed to start polling")?;
    info!("watching plant; press ctrl-c to stop");

    let mut updates = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(FleetEvent::FleetStateUpdated(fleet)) => {
                    print_fleet(&fleet);
                    updates += 1;
                    if ticks.is_some_and(|limit| updates >= limit) {
                        break;
                    }
                }
                Ok(FleetEvent::SeriesUpdated(series)) => print_series(&series),
                Ok(FleetEvent::ActionResults(results)) => print_results(&results),
                Ok(FleetEvent::PollFailed(message)) => eprintln!("poll failed: {message}"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "console fell behind the event stream"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.stop_polling().await;
    Ok(())
}

fn print_fleet(fleet: &FleetState) {
    println!(
        "{} (tick {}, {} reactors)",
        fleet.plant_name,
        fleet.tick,
        fleet.reactors.len()
    );
    for reactor in &fleet.reactors {
        println!(
            "  {:<12} {:<20} {:<20} {:>8.1} {:<8} rods {:>3} in/{:>3} out  coolant {:<3}  {:>8.1} {}  fuel {:>5.1}%",
            reactor.id,
            reactor.name,
            reactor.state,
            reactor.temperature.amount,
            reactor.temperature.unit,
            reactor.control_rods.inserted,
            reactor.control_rods.withdrawn,
            reactor.coolant,
            reactor.output.amount,
            reactor.output.unit,
            reactor.fuel_level,
        );
    }
    for line in fleet.logs.iter().rev().take(5) {
        println!("  log: {line}");
    }
}

fn print_series(series: &SeriesView) {
    if let (Some(label), Some(value)) = (series.labels.last(), series.values.last()) {
        println!(
            "  series: {value:.2} at {label:.1}s ({}/{} samples)",
            series.values.len(),
            series.capacity
        );
    }
}

fn print_results(results: &[ActionResult]) {
    for result in results {
        let target = result
            .target
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "fleet".to_string());
        let operation = result
            .operation
            .map(|op| op.to_string())
            .unwrap_or_else(|| result.kind.label().to_string());
        match result.error_message() {
            None => println!("  ok      {target:<12} {operation}"),
            Some(message) => println!("  failed  {target:<12} {operation}: {message}"),
        }
    }
}
