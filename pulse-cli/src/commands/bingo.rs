use super::session::require_connected;
use crate::config::{application_id, BINGO_APP_ENV};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use pulse_core::{ChainId, PulseError, Result, RoundSynchronizer, SessionManager, SyncView};
use pulse_games::bingo::{self, Bingo, GameRoom, BOARD_SIZE};
use pulse_games::PlayerStatus;
use std::sync::Arc;
use std::time::Duration;

#[derive(Subcommand)]
pub enum BingoCommands {
    /// Host a new room on this chain
    Create {
        /// Display name
        name: String,
        #[arg(long)]
        app: Option<String>,
    },
    /// Join a room hosted on another chain
    Join {
        /// Chain id of the host
        host_chain: String,
        /// Display name
        name: String,
        #[arg(long)]
        app: Option<String>,
    },
    /// Call a number on your turn
    Pick {
        number: u32,
        #[arg(long)]
        app: Option<String>,
    },
    /// Leave the current room
    Leave {
        #[arg(long)]
        app: Option<String>,
    },
    /// Drop all bingo state held on this chain
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
        #[arg(long)]
        app: Option<String>,
    },
    /// Show the room
    Show {
        #[arg(long)]
        app: Option<String>,
    },
    /// Follow the room until interrupted
    Watch {
        #[arg(long)]
        app: Option<String>,
    },
}

pub async fn handle_bingo_command(cmd: BingoCommands, session: &SessionManager) -> Result<()> {
    require_connected(session)?;

    match cmd {
        BingoCommands::Create { name, app } => {
            let sync = open(session, app)?;
            bingo::create_game(&sync, &name).await?;
            println!("Room created. Share your chain id so others can join:");
            println!("  {}", sync.viewer().chain_id);
        }

        BingoCommands::Join {
            host_chain,
            name,
            app,
        } => {
            let sync = open(session, app)?;
            bingo::join_game(&sync, &ChainId::new(host_chain.trim()), &name).await?;
            println!("Joined room hosted on {}", host_chain.trim());
        }

        BingoCommands::Pick { number, app } => {
            let sync = open(session, app)?;
            sync.poll().await?;
            bingo::pick_number(&sync, number).await?;
            println!("Called {}", number);
            print_view(&sync.view());
        }

        BingoCommands::Leave { app } => {
            let sync = open(session, app)?;
            bingo::leave_game(&sync).await?;
            println!("Left the room.");
        }

        BingoCommands::Reset { force, app } => {
            if !force {
                let confirmed = Confirm::new()
                    .with_prompt("Drop all bingo state on this chain?")
                    .default(false)
                    .interact()
                    .map_err(|e| PulseError::internal(format!("Prompt failed: {}", e)))?;

                if !confirmed {
                    println!("Reset cancelled");
                    return Ok(());
                }
            }

            let sync = open(session, app)?;
            bingo::hard_reset(&sync).await?;
            println!("Bingo state reset.");
        }

        BingoCommands::Show { app } => {
            let sync = open(session, app)?;
            sync.poll().await?;
            print_view(&sync.view());
        }

        BingoCommands::Watch { app } => {
            let sync = open(session, app)?;
            let _handle = sync.spawn();
            println!("Watching room, press Ctrl-C to stop.");

            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            let mut last: Option<GameRoom> = None;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let view = sync.view();
                        let room = view.state.as_ref().map(|s| s.payload.clone());
                        if view.has_fetched && room != last {
                            print_view(&view);
                            last = room;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}

fn open(session: &SessionManager, app: Option<String>) -> Result<Arc<RoundSynchronizer<Bingo>>> {
    let application = application_id(app, BINGO_APP_ENV)?;
    Ok(pulse_games::synchronizer(session, &application, Bingo)?)
}

fn print_view(view: &SyncView<Bingo>) {
    let room = match &view.state {
        Some(state) => &state.payload,
        None => {
            println!("Not in a room.");
            return;
        }
    };
    let me = &view.presentation;

    println!(
        "Room {} | {:?} | host {}{}",
        room.room_id,
        room.game_state,
        room.host_chain_id,
        if me.is_host { " (you)" } else { "" }
    );
    println!(
        "Called: {:?} | pot {} | {} active players",
        room.called_numbers, room.pot_amount, me.active_players
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Player", "Chain", "Marked", "Status"]);
    let turn = room.current_player().map(|p| p.chain_id.clone());
    for player in &room.players {
        let mut name = player.name.clone();
        if turn.as_ref() == Some(&player.chain_id) {
            name.push_str(" *");
        }
        if player.is_winner {
            name.push_str(" (winner)");
        }
        table.add_row(vec![
            name,
            player.chain_id.to_string(),
            format!("{}/{}", player.marked_count(), BOARD_SIZE),
            match player.status {
                PlayerStatus::Active => "active".to_string(),
                PlayerStatus::Left => "left".to_string(),
            },
        ]);
    }
    println!("{}", table);

    if let Some(winner) = &me.winner {
        println!("Winner: {}", winner);
    } else if me.my_turn {
        println!("Your turn: pulse bingo pick <1-{}>", BOARD_SIZE);
    }
}
