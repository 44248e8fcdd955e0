//! The generation capability seam.
//!
//! The pipeline only knows the capability as "prompt in, text out, may fail".
//! Implementations must be safe to share across concurrent requests.

use async_trait::async_trait;

use crate::error::CapabilityError;

/// An external generative text service.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Sends `prompt` and returns the model's raw text reply.
    ///
    /// The pipeline applies its own deadline around this call; dropping the
    /// returned future must abandon any in-flight work.
    async fn invoke(&self, prompt: &str) -> Result<String, CapabilityError>;

    /// A short name for logs.
    fn name(&self) -> &str;
}
