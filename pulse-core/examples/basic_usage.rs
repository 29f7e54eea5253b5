use pulse_core::{LocalSigner, SessionConfig, SessionHost, SessionManager, SessionNotice};
use std::sync::Arc;
use tempfile::tempdir;

struct PrintHost;

impl SessionHost for PrintHost {
    fn notify(&self, notice: SessionNotice) {
        println!("Notice: {}", notice);
    }

    fn reload(&self) {
        println!("Host asked to reload");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Create temp dir
    let temp_dir = tempdir()?;
    println!("Using temporary directory: {:?}", temp_dir.path());

    let primary = Arc::new(LocalSigner::generate()?);
    let manager = SessionManager::open(
        temp_dir.path(),
        SessionConfig::local(),
        primary,
        Arc::new(PrintHost),
    )
    .await?;

    let restored = manager.initialize().await?;
    println!("Restored previous session: {}", restored);

    // Needs a node and faucet on localhost
    println!("\nConnecting...");
    match manager.connect().await {
        Ok(()) => {
            let snapshot = manager.snapshot();
            println!("Connected!");
            println!("Chain: {:?}", snapshot.chain_id);
            println!("Automation signer: {:?}", snapshot.automation_address);
            println!("Balance: {:?}", snapshot.balance);
        }
        Err(e) => println!("Connect failed: {}", e),
    }

    Ok(())
}
