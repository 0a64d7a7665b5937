//! Interactive alert session: monitor events go to stdout, commands come from stdin.

use anyhow::{Result, anyhow};
use chrono::Local;
use homewatch_core::{
    AlertEvent, AlertKind, AlertSupervisor, Config, LocationStore, SettingsStore,
};
use std::future::{self, Future};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::render;

const HELP: &str = "commands: ack <alert>, on <alert>, off <alert>, toggle <alert>, \
                    status, help, quit (alerts: fire, flood, reminder)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionCommand {
    Acknowledge(AlertKind),
    Enable(AlertKind, bool),
    Toggle(AlertKind),
    Status,
    Help,
    Quit,
}

fn parse(line: &str) -> Result<Option<SessionCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let cmd = match (verb.to_lowercase().as_str(), arg) {
        ("ack" | "ok" | "dismiss", Some(kind)) => {
            SessionCommand::Acknowledge(AlertKind::try_from(kind)?)
        }
        ("on", Some(kind)) => SessionCommand::Enable(AlertKind::try_from(kind)?, true),
        ("off", Some(kind)) => SessionCommand::Enable(AlertKind::try_from(kind)?, false),
        ("toggle", Some(kind)) => SessionCommand::Toggle(AlertKind::try_from(kind)?),
        ("status", None) => SessionCommand::Status,
        ("help" | "?", None) => SessionCommand::Help,
        ("quit" | "exit" | "q", None) => SessionCommand::Quit,
        _ => return Err(anyhow!("Unrecognized command '{}'. {HELP}", line.trim())),
    };

    Ok(Some(cmd))
}

fn print_event(event: &AlertEvent) {
    let stamp = Local::now().format("%H:%M:%S");
    println!("[{stamp}] {}", render::event(event));
}

pub async fn run(config: Config, enabled: &[AlertKind]) -> Result<()> {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Ctrl-C handler unavailable");
            future::pending::<()>().await;
        }
    };

    run_with(config, enabled, BufReader::new(tokio::io::stdin()), interrupt).await
}

/// Session loop over any line source. Ends on `quit`, end of input, a read
/// error or `interrupt`, and always shuts the monitors down.
async fn run_with<R, F>(
    config: Config,
    enabled: &[AlertKind],
    input: R,
    interrupt: F,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let settings = SettingsStore::default();
    let location = LocationStore::new(config.location.clone());

    let (supervisor, mut events) =
        AlertSupervisor::spawn_from_config(&config, &settings, &location)?;
    let has_fire = supervisor.has_fire_monitor();

    for kind in enabled {
        if *kind == AlertKind::Fire && !has_fire {
            eprintln!(
                "Fire alerts are not available: set a readings URL and enable fire monitoring \
                 (`homewatch configure` or HOMEWATCH_API_URL / HOMEWATCH_FIRE_ALERT_ENABLED=true)."
            );
        }
        settings.set(*kind, true);
    }

    println!("Watching {}, {}.", config.location.city, config.location.country);
    println!("{}", render::status(&settings.current(), has_fire));
    println!("{HELP}");

    let mut lines = input.lines();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => break,

            Some(event) = events.recv() => print_event(&event),

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(error = %err, "failed to read from stdin");
                        break;
                    }
                };

                match parse(&line) {
                    Ok(None) => {}
                    Ok(Some(SessionCommand::Quit)) => break,
                    Ok(Some(SessionCommand::Help)) => println!("{HELP}"),
                    Ok(Some(SessionCommand::Status)) => {
                        println!("{}", render::status(&settings.current(), has_fire));
                    }
                    Ok(Some(SessionCommand::Enable(kind, on))) => {
                        settings.set(kind, on);
                        println!("{}", render::status(&settings.current(), has_fire));
                    }
                    Ok(Some(SessionCommand::Toggle(kind))) => {
                        settings.toggle(kind);
                        println!("{}", render::status(&settings.current(), has_fire));
                    }
                    Ok(Some(SessionCommand::Acknowledge(kind))) => {
                        if !supervisor.acknowledge(kind) {
                            eprintln!("No {kind} monitor is running.");
                        }
                    }
                    Err(err) => eprintln!("{err}"),
                }
            }
        }
    }

    info!("stopping alert session");
    supervisor.shutdown().await;
    Ok(())
}
