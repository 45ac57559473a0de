// src/display/terminal.rs
//! Terminal-based display implementation

use crate::{error::Result, gps::LinkData};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};
use tokio::time::sleep;
use tracing::warn;

pub struct TerminalDisplay;

impl TerminalDisplay {
    pub fn new() -> Self {
        Self
    }

    /// Start the terminal display loop
    pub async fn run(&self, data: Arc<RwLock<LinkData>>, running: Arc<AtomicBool>) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap)?;

        // Set up Ctrl+C handler
        let running_clone = Arc::clone(&running);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl+C");
            }
            running_clone.store(false, Ordering::Relaxed);
        });

        while running.load(Ordering::Relaxed) {
            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;

            let link_data = data.read().unwrap_or_else(PoisonError::into_inner).clone();
            self.render_display(&mut stdout, &link_data)?;

            stdout.flush()?;
            sleep(Duration::from_secs(1)).await;
        }

        execute!(stdout, Show, EnableLineWrap)?;
        println!("\nShutting down...");
        Ok(())
    }

    /// Render the snapshot to the terminal
    pub fn render_display(&self, stdout: &mut impl Write, data: &LinkData) -> Result<()> {
        // Header
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("GGA Monitor - NMEA position over TCP"),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )?;

        let timestamp_str = match data.timestamp {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => "No data received".to_string(),
        };
        execute!(stdout, Print(format!("Last Update: {}\n\n", timestamp_str)))?;

        self.render_connection_section(stdout, data)?;
        self.render_position_section(stdout, data)?;
        self.render_counters_section(stdout, data)?;

        // Footer
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Press Ctrl+C to exit"),
            Print("\n"),
            ResetColor
        )?;

        Ok(())
    }

    fn render_connection_section(&self, stdout: &mut impl Write, data: &LinkData) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print("CONNECTION:\n"),
            ResetColor
        )?;

        execute!(
            stdout,
            Print(format!(
                "  Receiver:  {:>12}\n",
                data.endpoint.as_deref().unwrap_or("Unknown")
            ))
        )?;

        let status_color = if data.connected { Color::Green } else { Color::Red };
        execute!(
            stdout,
            Print("  Status:    "),
            SetForegroundColor(status_color),
            Print(format!("{}\n", data.get_status_description())),
            ResetColor
        )?;

        if let Some(since) = data.connected_since {
            execute!(
                stdout,
                Print(format!("  Since:     {}\n", since.format("%H:%M:%S UTC")))
            )?;
        }

        execute!(stdout, Print("\n"))?;
        Ok(())
    }

    fn render_position_section(&self, stdout: &mut impl Write, data: &LinkData) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Cyan),
            Print("POSITION:\n"),
            ResetColor
        )?;

        let position = data.last_fix.and_then(|fix| fix.position());
        execute!(
            stdout,
            Print(format!(
                "  Latitude:  {}\n",
                LinkData::format_coordinate(position.map(|(lat, _)| lat))
            ))
        )?;
        execute!(
            stdout,
            Print(format!(
                "  Longitude: {}\n",
                LinkData::format_coordinate(position.map(|(_, lon)| lon))
            ))
        )?;
        execute!(
            stdout,
            Print(format!("  Age:       {}\n", LinkData::format_value(data.age_seconds(), "s")))
        )?;

        // keep the last known position visible while the receiver has no fix
        if position.is_none() {
            if let Some((lat, lon)) = data.last_position {
                execute!(
                    stdout,
                    SetForegroundColor(Color::DarkGrey),
                    Print(format!("  Last known: {:.6}, {:.6}\n", lat, lon)),
                    ResetColor
                )?;
            }
        }

        execute!(stdout, Print("\n"))?;
        Ok(())
    }

    fn render_counters_section(&self, stdout: &mut impl Write, data: &LinkData) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Magenta),
            Print("COUNTERS:\n"),
            ResetColor
        )?;

        execute!(
            stdout,
            Print(format!("  Fixes:       {}\n", LinkData::format_value(Some(data.fixes), "")))
        )?;
        execute!(
            stdout,
            Print(format!(
                "  No fix:      {}\n",
                LinkData::format_value(Some(data.no_fix_reports), "")
            ))
        )?;
        execute!(
            stdout,
            Print(format!(
                "  Connects:    {}\n",
                LinkData::format_value(Some(data.connects), "")
            ))
        )?;
        execute!(
            stdout,
            Print(format!(
                "  Disconnects: {}\n\n",
                LinkData::format_value(Some(data.disconnects), "")
            ))
        )?;

        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}
