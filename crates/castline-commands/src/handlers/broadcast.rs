//! `!enviar:mensaje`: paced broadcast to every known recipient.
//!
//! A message starting with the command marker is not sent as text: each
//! recipient gets that command executed on its behalf instead, so
//! `!enviar:!tormenta` delivers the storm alert to everyone.

use async_trait::async_trait;
use castline_core::error::{CastlineError, Result};
use castline_core::types::Payload;
use castline_scheduler::{DeliverySink, DispatchItem, DispatchJob, DispatchReport};

use crate::command::Command;
use crate::handler::{CommandContext, CommandHandler, Invocation};
use crate::router::CommandRouter;

pub struct BroadcastHandler;

#[async_trait]
impl CommandHandler for BroadcastHandler {
    fn verb(&self) -> &str {
        "enviar"
    }

    fn usage(&self) -> &str {
        ":mensaje"
    }

    fn description(&self) -> &str {
        "Envío masivo a todos los clientes"
    }

    fn fans_out(&self) -> bool {
        true
    }

    async fn handle(&self, ctx: &CommandContext<'_>, command: &Command) -> Result<()> {
        let services = ctx.services();
        let syntax = services.syntax;
        if command.args_text.is_empty() {
            return Err(CastlineError::MissingArgument(format!(
                "{}{}mensaje",
                syntax.render(&command.verb),
                syntax.separator
            )));
        }
        if !services.session.is_ready() {
            return Err(CastlineError::Session(format!(
                "cannot broadcast while session is {:?}",
                services.session.state()
            )));
        }

        let recipients = services.broadcast_recipients().await;
        if recipients.is_empty() {
            return Err(CastlineError::NoRecipients);
        }

        let message = &command.args_text;
        let items: Vec<DispatchItem> = if syntax.is_command(message) {
            recipients
                .into_iter()
                .map(|r| DispatchItem::command(r, message.clone()))
                .collect()
        } else {
            let text = format!("{}{}", services.broadcast_prefix, message);
            recipients
                .into_iter()
                .map(|r| DispatchItem::text(r, text.clone()))
                .collect()
        };

        let job = DispatchJob::new(items);
        tracing::info!(
            "📢 Broadcast {} from {}: {} recipient(s)",
            job.id,
            ctx.invocation.sender.label(),
            job.len()
        );
        let sink = RouterSink {
            router: ctx.router,
            origin: ctx.invocation,
        };
        let report = services.dispatcher.dispatch(job, &sink).await?;

        if let Err(e) = ctx.reply(summary(&report)).await {
            tracing::warn!("Could not deliver broadcast summary: {e}");
        }
        Ok(())
    }
}

fn summary(report: &DispatchReport) -> String {
    let mut text = format!(
        "✅ Envío completado\n• Enviados: {}\n• Fallidos: {}",
        report.delivered, report.failed
    );
    if report.abandoned > 0 {
        text.push_str(&format!("\n• Sin enviar: {}", report.abandoned));
    }
    text
}

/// Delivers broadcast items: text through the session, commands through the
/// router one level deeper. Every attempted recipient is recorded.
pub struct RouterSink<'a> {
    router: &'a CommandRouter,
    origin: &'a Invocation,
}

#[async_trait]
impl DeliverySink for RouterSink<'_> {
    async fn deliver(&self, item: &DispatchItem) -> Result<()> {
        let services = self.router.services();
        let result = if item.is_command {
            let invocation = self.origin.nested(item.recipient.clone());
            self.router.route(&invocation, &item.payload).await
        } else {
            services
                .session
                .send(&item.recipient, &Payload::text(item.payload.clone()))
                .await
        };

        if result.is_ok()
            && let Err(e) = services.registry.add(&item.recipient).await
        {
            tracing::warn!("Could not register {}: {e}", item.recipient);
        }
        if let Err(e) = services.registry.touch(&item.recipient).await {
            tracing::warn!("Could not record attempt for {}: {e}", item.recipient);
        }
        result
    }
}
