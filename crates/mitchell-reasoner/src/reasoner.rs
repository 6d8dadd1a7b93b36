use async_trait::async_trait;
use mitchell_types::Result;

use crate::message::{Decision, Message, ToolSchema};

/// A backend capable of deciding the next navigation action from the current
/// conversation, the tool schema available at this step, and an optional
/// screenshot of the page as it currently stands.
///
/// Implementations retry transient failures themselves (via
/// [`mitchell_types::retry::with_backoff`]) and surface only the final
/// outcome here.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn decide(
        &self,
        system: &str,
        turns: &[Message],
        tools: &[ToolSchema],
        screenshot: Option<&[u8]>,
    ) -> Result<Decision>;

    /// A short label used in logs and error messages, e.g. `"cloud"`.
    fn name(&self) -> &'static str;
}
