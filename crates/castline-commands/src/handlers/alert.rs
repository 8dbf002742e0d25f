//! Fixed announcements (`!tormenta`, `!cambios`, ...).

use async_trait::async_trait;
use castline_core::config::AlertConfig;
use castline_core::error::Result;
use castline_core::types::Payload;
use std::path::PathBuf;

use crate::command::Command;
use crate::handler::{CommandContext, CommandHandler};

/// Sends a configured image with its caption to the invocation target,
/// falling back to the caption alone when the image cannot be sent.
pub struct AlertHandler {
    verb: String,
    description: String,
    image: Option<PathBuf>,
    caption: String,
}

impl AlertHandler {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            verb: config.verb.to_lowercase(),
            description: config.description.clone(),
            image: config.image_path.as_ref().map(PathBuf::from),
            caption: config.caption.clone(),
        }
    }
}

#[async_trait]
impl CommandHandler for AlertHandler {
    fn verb(&self) -> &str {
        &self.verb
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn handle(&self, ctx: &CommandContext<'_>, _command: &Command) -> Result<()> {
        let target = &ctx.invocation.target;
        if let Some(image) = &self.image {
            if tokio::fs::try_exists(image).await.unwrap_or(false) {
                let media = Payload::media(image.clone(), self.caption.clone());
                match ctx.services().session.send(target, &media).await {
                    Ok(()) => return Ok(()),
                    Err(e) => tracing::warn!(
                        "⚠️ Could not send {} to {target}, falling back to text: {e}",
                        image.display()
                    ),
                }
            } else {
                tracing::warn!("⚠️ Alert image {} not found, sending text", image.display());
            }
        }
        ctx.reply(self.caption.clone()).await
    }
}
