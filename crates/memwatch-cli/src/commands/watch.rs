//! Watch mode: reassert locks and print every variable on each tick.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{cursor, execute, terminal};
use memwatch_core::{LockState, TickReport, WatchRow, WatchSession};
use tracing::{info, warn};

use crate::input::{self, KeyCommand};
use crate::shutdown::ShutdownSignal;
use crate::workspace::Workspace;

pub struct WatchOptions {
    pub locks: Vec<String>,
    pub interval: Option<u64>,
    pub ticks: Option<u64>,
}

pub fn run(workspace: &Workspace, options: WatchOptions) -> Result<()> {
    let shutdown = ShutdownSignal::with_ctrlc()?;
    let (_keyboard_handle, keys) = input::spawn_keyboard_monitor(Arc::clone(&shutdown));

    let ctx = workspace.context();
    let mut session = WatchSession::new(
        workspace.variables()?,
        workspace.config.drop_failed_locks,
    );

    for name in &options.locks {
        match session.toggle_lock(&ctx, name)? {
            LockState::Unlocked => warn!("Could not capture {} for locking", name),
            state => info!("{} is {}", name, state),
        }
    }

    let interval =
        Duration::from_millis(options.interval.unwrap_or(workspace.config.poll_interval_ms));
    let clear_screen = options.ticks.is_none();
    let mut stdout = io::stdout();
    let mut tick: u64 = 0;

    while !shutdown.is_shutdown() {
        while let Ok(command) = keys.try_recv() {
            if command == KeyCommand::ReleaseLocks {
                session.clear_locks();
                info!("Released all locks");
            }
        }

        let report = session.tick(&ctx);
        if clear_screen {
            execute!(
                stdout,
                terminal::Clear(terminal::ClearType::All),
                cursor::MoveTo(0, 0)
            )?;
        }
        writeln!(stdout, "{}", render(&report, tick))?;
        stdout.flush()?;

        tick += 1;
        if options.ticks.is_some_and(|limit| tick >= limit) {
            break;
        }
        if shutdown.wait(interval) {
            break;
        }
    }

    // Stops the keyboard monitor
    shutdown.trigger();
    Ok(())
}

fn render(report: &TickReport, tick: u64) -> String {
    let mut out = format!(
        "tick {}  locks: {} applied, {} failed (Esc/q quit, u release locks)\n",
        tick, report.locks.applied, report.locks.failed
    );
    for row in &report.rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

fn render_row(row: &WatchRow) -> String {
    let marker = match row.lock {
        LockState::Locked => "[L]",
        LockState::Partial => "[l]",
        LockState::Unlocked => "   ",
    };
    let pin = if row.fixed { "*" } else { " " };
    let values = if row.values.is_empty() {
        memwatch_core::NO_ADDRESS.to_string()
    } else {
        row.values.join(", ")
    };
    format!("{}{} {:<24} {}", marker, pin, row.name, values)
}
