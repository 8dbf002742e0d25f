//! Manual registry maintenance: `!agregar:numero` and `!quitar:numero`.

use async_trait::async_trait;
use castline_core::error::{CastlineError, Result};

use crate::command::Command;
use crate::handler::{CommandContext, CommandHandler};

fn canonical_argument(ctx: &CommandContext<'_>, command: &Command, usage: &str) -> Result<String> {
    let services = ctx.services();
    if command.args_text.is_empty() {
        let syntax = services.syntax;
        return Err(CastlineError::MissingArgument(format!(
            "{}{}{}",
            syntax.render(&command.verb),
            syntax.separator,
            usage
        )));
    }
    services.numbering.canonicalize(&command.args_text)
}

pub struct AddRecipientHandler;

#[async_trait]
impl CommandHandler for AddRecipientHandler {
    fn verb(&self) -> &str {
        "agregar"
    }

    fn usage(&self) -> &str {
        ":numero"
    }

    fn description(&self) -> &str {
        "Agrega un número a la lista de difusión"
    }

    async fn handle(&self, ctx: &CommandContext<'_>, command: &Command) -> Result<()> {
        let number = canonical_argument(ctx, command, "numero")?;
        ctx.services().registry.add(&number).await?;
        ctx.reply(format!("✅ Número {number} agregado")).await
    }
}

pub struct RemoveRecipientHandler;

#[async_trait]
impl CommandHandler for RemoveRecipientHandler {
    fn verb(&self) -> &str {
        "quitar"
    }

    fn usage(&self) -> &str {
        ":numero"
    }

    fn description(&self) -> &str {
        "Quita un número de la lista de difusión"
    }

    async fn handle(&self, ctx: &CommandContext<'_>, command: &Command) -> Result<()> {
        let number = canonical_argument(ctx, command, "numero")?;
        ctx.services().registry.remove(&number).await?;
        ctx.reply(format!("🗑️ Número {number} eliminado")).await
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{CUSTOMER, Harness, OPERATOR};
    use castline_core::error::CastlineError;

    #[tokio::test]
    async fn test_add_then_remove() {
        let h = Harness::builder("membership").build().await;
        h.route_as_operator("!agregar:011 2233-4455").await.unwrap();
        assert!(h.services().registry.get(CUSTOMER).await.is_some());

        h.route_as_operator("!quitar:+54 9 11 2233 4455").await.unwrap();
        assert!(h.services().registry.is_empty().await);

        let replies = h.texts_to(OPERATOR);
        assert_eq!(replies[0], format!("✅ Número {CUSTOMER} agregado"));
        assert_eq!(replies[1], format!("🗑️ Número {CUSTOMER} eliminado"));
    }

    #[tokio::test]
    async fn test_invalid_number_is_rejected() {
        let h = Harness::builder("membership-invalid").build().await;
        assert!(matches!(
            h.route_as_operator("!agregar:123").await,
            Err(CastlineError::InvalidNumber(_))
        ));
        assert!(matches!(
            h.route_as_operator("!quitar").await,
            Err(CastlineError::MissingArgument(u)) if u == "!quitar:numero"
        ));
        assert!(h.sent().is_empty());
    }
}
