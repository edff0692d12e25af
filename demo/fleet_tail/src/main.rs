mod config;
use config::FleetTailConfig;
use fleetwatch_core::history::{sparkline, StatsSeries};
use fleetwatch_core::telemetry::init_logging;
use fleetwatch_core::{ChannelState, ClassifiedError, Fleetwatch, KeyedSubscription};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

const RETRY_DELAY: Duration = Duration::from_secs(2);

fn report(stream: &str, err: &ClassifiedError) {
    warn!(
        target: "fleet_tail",
        stream,
        code = ?err.code(),
        retryable = err.is_retryable(),
        "{}",
        err.user_message()
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info,fleetwatch_core=info,fleet_tail=info");
    info!(target: "fleet_tail", "Starting fleet tail");

    // Defaults + env + optional TOML overlay
    let cfg = FleetTailConfig::load();
    let fleet = Fleetwatch::new(&cfg.client)?;

    // One-shot listing; a failure here is not fatal when a target was configured
    let containers = match fleet.operations.containers().await {
        Ok(list) => list,
        Err(e) => {
            error!(target: "fleet_tail", code = ?e.code(), "{}", e.user_message());
            Vec::new()
        }
    };
    for c in &containers {
        info!(target: "fleet_tail", id = %c.id, name = %c.name, state = %c.state, "Container");
    }

    let target = cfg
        .container_id
        .clone()
        .or_else(|| containers.first().map(|c| c.id.clone()));
    let Some(target) = target else {
        warn!(target: "fleet_tail", "No container to tail");
        fleet.shutdown();
        return Ok(());
    };
    info!(target: "fleet_tail", container = %target, "Tailing container");

    let hub = fleet.streams.clone();
    let mut logs =
        KeyedSubscription::with_key(move |id| hub.container_logs(id), Some(target.as_str()));
    let hub = fleet.streams.clone();
    let mut stats =
        KeyedSubscription::with_key(move |id| hub.container_stats(id), Some(target.as_str()));
    let mut series = StatsSeries::new(cfg.stats_window);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    error!(target: "fleet_tail", error = %e, "Failed to listen for Ctrl+C");
                }
                info!(target: "fleet_tail", "Shutting down...");
                break;
            }
            state = logs.changed(), if logs.is_bound() => match state {
                Some(ChannelState::Value(line)) => {
                    println!("{} {:<5} {}", line.timestamp, line.level, line.content);
                    if cfg.show_grouped_lines {
                        for extra in &line.grouped_lines {
                            println!("    {}", extra);
                        }
                    }
                }
                Some(ChannelState::Failed(e)) => {
                    report("logs", &e);
                    if !e.is_retryable() {
                        break;
                    }
                    // Channels do not reconnect on their own; rebind
                    tokio::time::sleep(RETRY_DELAY).await;
                    logs.clear();
                    logs.set_key(Some(target.as_str()));
                }
                Some(ChannelState::Pending) => {}
                Some(ChannelState::Closed) | None => break,
            },
            state = stats.changed(), if stats.is_bound() => match state {
                Some(ChannelState::Value(sample)) => {
                    series.record((*sample).clone());
                    println!(
                        "cpu {:>5.1}% mem {:>5.1}% {}",
                        sample.cpu_percent,
                        sample.memory_percent,
                        sparkline(&series.cpu())
                    );
                }
                Some(ChannelState::Failed(e)) => {
                    report("stats", &e);
                    if e.is_retryable() {
                        tokio::time::sleep(RETRY_DELAY).await;
                        stats.clear();
                        stats.set_key(Some(target.as_str()));
                    } else {
                        stats.clear();
                    }
                }
                Some(ChannelState::Pending) => {}
                Some(ChannelState::Closed) | None => {
                    stats.clear();
                }
            },
        }
    }

    for (name, s) in fleet.streams.stats() {
        if s.total_opened > 0 {
            info!(
                target: "fleet_tail",
                registry = name,
                opened = s.total_opened,
                events = s.events_received,
                errors = s.errors_received,
                "Registry stats"
            );
        }
    }

    drop(logs);
    drop(stats);
    fleet.shutdown();
    Ok(())
}
