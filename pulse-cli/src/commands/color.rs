use super::session::require_connected;
use crate::config::{application_id, COLOR_APP_ENV};
use clap::Subcommand;
use pulse_core::{Result, RoundSynchronizer, SessionManager, SyncView, TransitionOutcome};
use pulse_games::color_trading::{self, Color, ColorTrading};
use std::sync::Arc;
use std::time::Duration;

#[derive(Subcommand)]
pub enum ColorCommands {
    /// Follow the current round, pushing overdue phases forward
    Watch {
        /// Color trading application id
        #[arg(long)]
        app: Option<String>,
    },
    /// Bet on a color in the open round
    Bet {
        /// Amount to bet
        amount: u64,
        /// Color to bet on (A to E)
        color: String,
        /// Color trading application id
        #[arg(long)]
        app: Option<String>,
    },
    /// Start a new round by hand
    Start {
        /// Color trading application id
        #[arg(long)]
        app: Option<String>,
    },
}

pub async fn handle_color_command(cmd: ColorCommands, session: &SessionManager) -> Result<()> {
    require_connected(session)?;

    match cmd {
        ColorCommands::Watch { app } => {
            let sync = open(session, app)?;
            let _handle = sync.spawn();
            println!("Watching color rounds, press Ctrl-C to stop.");

            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            let mut last_line = String::new();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let line = describe(&sync.view());
                        if line != last_line {
                            println!("{}", line);
                            last_line = line;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }

        ColorCommands::Bet { amount, color, app } => {
            let color: Color = color.parse()?;
            let sync = open(session, app)?;
            sync.poll().await?;

            color_trading::place_bet(&sync, amount, color).await?;
            println!(
                "Bet {} on {} (pays {}.{:02}x)",
                amount,
                color,
                color.multiplier() / 100,
                color.multiplier() % 100
            );
        }

        ColorCommands::Start { app } => {
            let sync = open(session, app)?;
            match color_trading::start_round(&sync).await {
                TransitionOutcome::Submitted => println!("New round started."),
                TransitionOutcome::Suppressed => println!("A transition was just sent, try again shortly."),
                TransitionOutcome::Failed(reason) => println!("Could not start round: {}", reason),
            }
        }
    }

    Ok(())
}

fn open(session: &SessionManager, app: Option<String>) -> Result<Arc<RoundSynchronizer<ColorTrading>>> {
    let application = application_id(app, COLOR_APP_ENV)?;
    Ok(pulse_games::synchronizer(session, &application, ColorTrading)?)
}

fn describe(view: &SyncView<ColorTrading>) -> String {
    let mut line = match &view.state {
        None if !view.has_fetched => "Waiting for first poll...".to_string(),
        None => "No active round".to_string(),
        Some(round) => {
            let mut line = format!(
                "Round {} | {:?} | {} bets",
                round.round_id,
                round.phase,
                round.payload.bets.len()
            );
            if let Some(left) = view.time_left {
                line.push_str(&format!(" | {}s left", left.as_secs()));
            }
            if let Some(winner) = round.payload.winning_color {
                line.push_str(&format!(" | winner {}", winner));
            }
            line
        }
    };

    if let Some(win) = &view.presentation.last_win {
        line.push_str(&format!(" | you won {} on {}", win.amount, win.color));
    }
    if let Some(error) = &view.last_error {
        line.push_str(&format!(
            " | {} failed polls ({})",
            view.consecutive_failures, error
        ));
    }
    line
}
