use async_trait::async_trait;

/// Yes/no gate that destructive commands pass through before anything is sent.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

pub struct AutoConfirm;

#[async_trait]
impl ConfirmationGate for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

pub struct DenyAll;

#[async_trait]
impl ConfirmationGate for DenyAll {
    async fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}
