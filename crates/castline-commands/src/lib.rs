//! # Castline Commands
//!
//! Authorized command routing.
//!
//! ```text
//! "!enviar:hola" ─► CommandSyntax::parse ─► Command { verb: "enviar", .. }
//!                                              │
//!   Allowlist::authorize(sender) ◄─────────────┤
//!   HandlerRegistry::get("enviar") ◄───────────┘
//!        └─► BroadcastHandler ─► BroadcastDispatcher ─► RouterSink per recipient
//!                                                         ├── text    → Session::send
//!                                                         └── command → CommandRouter (depth 1)
//! ```

pub mod command;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{Command, CommandSyntax};
pub use handler::{CommandContext, CommandHandler, Invocation};
pub use registry::HandlerRegistry;
pub use router::CommandRouter;
pub use services::Services;
