use async_trait::async_trait;
use client_core::ConfirmationGate;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

/// Asks on the terminal; anything but `y`/`yes` declines.
pub struct StdinGate;

#[async_trait]
impl ConfirmationGate for StdinGate {
    async fn confirm(&self, prompt: &str) -> bool {
        let mut stdout = io::stdout();
        if let Err(err) = stdout.write_all(format!("{prompt} [y/N] ").as_bytes()).await {
            warn!(%err, "cannot write confirmation prompt");
            return false;
        }
        let _ = stdout.flush().await;

        let mut answer = String::new();
        match BufReader::new(io::stdin()).read_line(&mut answer).await {
            Ok(_) => is_yes(&answer),
            Err(err) => {
                warn!(%err, "cannot read confirmation answer");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
