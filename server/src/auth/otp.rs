use async_trait::async_trait;

/// Delivers one-time login codes to users with two-factor sign-in enabled.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Writes codes to the debug log. Suitable for development only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, email: &str, code: &str) -> anyhow::Result<()> {
        tracing::debug!("One-time code for {}: {}", email, code);
        Ok(())
    }
}
