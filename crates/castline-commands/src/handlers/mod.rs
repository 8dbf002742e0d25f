//! Built-in verb handlers.

mod alert;
mod broadcast;
mod help;
mod list;
mod membership;

pub use alert::AlertHandler;
pub use broadcast::{BroadcastHandler, RouterSink};
pub use help::HelpHandler;
pub use list::ListHandler;
pub use membership::{AddRecipientHandler, RemoveRecipientHandler};
