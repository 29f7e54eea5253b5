use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use clap::Subcommand;
use pulse_core::{Address, PulseError, Result, SessionManager, SessionSnapshot};
use std::time::Duration;
use tokio::sync::watch;

const REGISTRATION_WAIT: Duration = Duration::from_secs(30);

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Connect the primary wallet and claim a chain
    Connect,
    /// Show the current session
    Status {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the chain balance
    Balance {
        /// Keep refreshing until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Ask the faucet for more tokens
    Faucet,
    /// Wipe all local session state
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_session_command(cmd: SessionCommands, session: &SessionManager) -> Result<()> {
    match cmd {
        SessionCommands::Connect => {
            if session.snapshot().is_connected() {
                println!("Already connected.");
                let owners = session.authorized_owners().await?;
                print_snapshot(&session.snapshot(), &owners);
                return Ok(());
            }

            println!("Connecting...");
            session.connect().await?;

            // Registration runs in the background; keep the process alive
            // until it lands.
            let registered =
                tokio::time::timeout(REGISTRATION_WAIT, wait_for_registration(session.subscribe()))
                    .await
                    .unwrap_or(false);

            println!("Connected successfully!");
            if !registered {
                println!("Automation signer not registered yet; game actions may prompt.");
            }
            println!();
            let owners = session.authorized_owners().await?;
            print_snapshot(&session.snapshot(), &owners);
        }

        SessionCommands::Status { json } => {
            let snapshot = session.snapshot();
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&snapshot).map_err(PulseError::from)?
                );
            } else {
                let owners = session.authorized_owners().await?;
                print_snapshot(&snapshot, &owners);
            }
        }

        SessionCommands::Balance { watch } => {
            require_connected(session)?;

            if !watch {
                match session.refresh_balance().await {
                    Some(balance) => println!("Balance: {}", balance),
                    None => match session.snapshot().balance {
                        Some(cached) => println!("Balance: {} (cached)", cached),
                        None => println!("Balance: unavailable"),
                    },
                }
                return Ok(());
            }

            let _refresher = session.spawn_balance_refresher();
            let mut updates = session.subscribe();
            let mut last = None;
            println!("Watching balance, press Ctrl-C to stop.");

            loop {
                let balance = updates.borrow_and_update().balance;
                if balance != last {
                    if let Some(balance) = balance {
                        println!("Balance: {}", balance);
                    }
                    last = balance;
                }

                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }

        SessionCommands::Faucet => {
            require_connected(session)?;

            println!("Requesting funds...");
            session.request_funds().await?;
            match session.snapshot().balance {
                Some(balance) => println!("Funds received. Balance: {}", balance),
                None => println!("Funds requested."),
            }
        }

        SessionCommands::Reset { force } => {
            if !force {
                let confirmed = Confirm::new()
                    .with_prompt("This wipes the stored identity and every local cache. Continue?")
                    .default(false)
                    .interact()
                    .map_err(|e| PulseError::internal(format!("Prompt failed: {}", e)))?;

                if !confirmed {
                    println!("Reset cancelled");
                    return Ok(());
                }
            }

            session.disconnect().await?;
            println!("Session reset.");
        }
    }

    Ok(())
}

pub fn require_connected(session: &SessionManager) -> Result<()> {
    if session.snapshot().is_connected() {
        Ok(())
    } else {
        Err(PulseError::NotConnected)
    }
}

async fn wait_for_registration(mut updates: watch::Receiver<SessionSnapshot>) -> bool {
    loop {
        if updates.borrow_and_update().automation_registered {
            return true;
        }
        if updates.changed().await.is_err() {
            return false;
        }
    }
}

fn print_snapshot(snapshot: &SessionSnapshot, owners: &[Address]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);

    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    table.add_row(vec!["Status".to_string(), format!("{:?}", snapshot.status)]);
    table.add_row(vec![
        "Chain".to_string(),
        or_dash(snapshot.chain_id.as_ref().map(ToString::to_string)),
    ]);
    table.add_row(vec![
        "Primary".to_string(),
        or_dash(snapshot.primary_address.as_ref().map(ToString::to_string)),
    ]);
    table.add_row(vec![
        "Automation".to_string(),
        or_dash(snapshot.automation_address.as_ref().map(ToString::to_string)),
    ]);
    table.add_row(vec![
        "Registered".to_string(),
        snapshot.automation_registered.to_string(),
    ]);
    table.add_row(vec![
        "Balance".to_string(),
        or_dash(snapshot.balance.map(|b| b.to_string())),
    ]);
    if !owners.is_empty() {
        let owners: Vec<String> = owners.iter().map(ToString::to_string).collect();
        table.add_row(vec!["Authorized owners".to_string(), owners.join("\n")]);
    }
    if let Some(error) = &snapshot.error {
        table.add_row(vec!["Last error".to_string(), error.clone()]);
    }

    println!("{}", table);
}
