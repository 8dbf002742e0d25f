//! Inbound message path.
//!
//! Every sender that canonicalizes is remembered in the registry, whether or
//! not it may issue commands. Commands from non-operators are dropped without
//! a reply; other command failures are answered with a readable cause.

use castline_commands::{CommandRouter, Invocation};
use castline_core::CastlineError;
use castline_core::types::{InboundMessage, Payload};

pub async fn handle_inbound(router: &CommandRouter, message: InboundMessage) {
    let services = router.services();
    if !services.session.is_ready() {
        tracing::debug!("Ignoring inbound message while session is not ready");
        return;
    }

    let sender = match services.numbering.canonicalize(message.sender_address()) {
        Ok(number) => number,
        Err(e) => {
            tracing::warn!("Ignoring message from {}: {e}", message.sender_raw_id);
            return;
        }
    };

    if let Err(e) = services.registry.add(&sender).await {
        tracing::warn!("Could not register {sender}: {e}");
    }

    if !services.syntax.is_command(&message.text) {
        return;
    }

    match router.route(&Invocation::from_number(sender.clone()), &message.text).await {
        Ok(()) => {}
        Err(CastlineError::Unauthorized(_)) => {}
        Err(e) => {
            tracing::warn!("Command from {sender} failed: {e}");
            let reply = Payload::text(format!("❌ Error: {}", e.user_message()));
            if let Err(e) = services.session.send(&sender, &reply).await {
                tracing::warn!("Could not deliver error reply to {sender}: {e}");
            }
        }
    }
}
