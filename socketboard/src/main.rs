use std::time::Duration;

use anyhow::{Context, Result};
use strum::IntoEnumIterator;
use tokio::signal::unix::{self, SignalKind};
use tokio::time;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use socketboard::config::{self, BoardConfig};
use socketboard::module::{self, led7c::Color, Led7c, Module};
use socketboard::pin::SocketType;
use socketboard::sim::SimBoard;
use socketboard::tracing::{self, prelude::*};

const COLOR_PERIOD: Duration = Duration::from_millis(500);

/// Step the LED through every colour until told to stop, then switch it off.
async fn cycle_colors(mut led: Led7c, running: CancellationToken) {
    trace!("Task started.");

    let mut colors = Color::iter().cycle();
    let mut ticker = time::interval(COLOR_PERIOD);

    loop {
        tokio::select! {
            _ = running.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(color) = colors.next() {
                    led.set_color(color);
                    debug!(socket = %led.socket(), %color, "LED colour changed.");
                }
            }
        }
    }

    led.turn_off();
    trace!("Task stopped.");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stdout();

    let config = BoardConfig::load().context("failed to load board description")?;
    let board = SimBoard::new(&config).context("failed to build simulated board")?;

    let sim = board
        .sockets()
        .iter()
        .find(|sim| {
            sim.types()
                .iter()
                .any(|t| matches!(t, SocketType::X | SocketType::Y))
        })
        .context("board has no socket with general purpose I/O")?;
    let led: Led7c = module::attach(sim.socket(), config::module_init_timeout()).await?;

    let running = CancellationToken::new();
    let tracker = TaskTracker::new();
    tracker.spawn(cycle_colors(led, running.clone()));
    tracker.close();
    info!(board = board.name(), "Started.");

    let mut sigint = unix::signal(SignalKind::interrupt())?;
    let mut sigterm = unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }

    trace!("Shutting down.");
    running.cancel();

    tracker.wait().await;
    info!("Exiting.");
    Ok(())
}
