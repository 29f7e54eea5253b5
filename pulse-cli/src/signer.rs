use crate::config::MNEMONIC_ENV;
use async_trait::async_trait;
use dialoguer::{Confirm, Password};
use pulse_core::signer::local::generate_mnemonic;
use pulse_core::{Address, LocalSigner, PulseError, Result, Signature, Signer};
use tokio::sync::OnceCell;

/// Primary signer that lives in the terminal: the key is unlocked on first
/// use and every signature is confirmed by the user.
pub struct TerminalSigner {
    key: OnceCell<LocalSigner>,
    auto_approve: bool,
}

impl TerminalSigner {
    pub fn new(auto_approve: bool) -> Self {
        Self {
            key: OnceCell::new(),
            auto_approve,
        }
    }

    async fn unlock(&self) -> Result<&LocalSigner> {
        self.key
            .get_or_try_init(|| async {
                let material = match std::env::var(MNEMONIC_ENV) {
                    Ok(phrase) if !phrase.trim().is_empty() => phrase,
                    _ => prompt_mnemonic().await?,
                };
                LocalSigner::from_material(&material)
            })
            .await
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> std::result::Result<T, dialoguer::Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PulseError::internal(format!("Prompt task failed: {}", e)))?
        .map_err(|e| PulseError::internal(format!("Prompt failed: {}", e)))
}

async fn prompt_mnemonic() -> Result<String> {
    let phrase = blocking(|| {
        Password::new()
            .with_prompt("Primary wallet mnemonic (leave empty to create one)")
            .allow_empty_password(true)
            .interact()
    })
    .await?;

    if !phrase.trim().is_empty() {
        return Ok(phrase);
    }

    let phrase = generate_mnemonic()?;
    println!();
    println!("IMPORTANT: Save your mnemonic phrase securely!");
    println!("Mnemonic: {}", phrase);
    println!("Set {} to skip this prompt next time.", MNEMONIC_ENV);
    println!();
    Ok(phrase)
}

#[async_trait]
impl Signer for TerminalSigner {
    async fn address(&self) -> Result<Address> {
        Ok(self.unlock().await?.local_address().clone())
    }

    async fn sign(&self, owner: &Address, payload: &[u8]) -> Result<Signature> {
        let key = self.unlock().await?;

        if !self.auto_approve {
            let prompt = format!("Sign a {} byte request as {}?", payload.len(), owner);
            let approved = blocking(move || {
                Confirm::new()
                    .with_prompt(prompt)
                    .default(true)
                    .interact()
            })
            .await?;

            if !approved {
                return Err(PulseError::rejected("User rejected the request"));
            }
        }

        key.sign(owner, payload).await
    }
}
