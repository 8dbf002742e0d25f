//! # Castline Scheduler
//!
//! Recipient bookkeeping and paced broadcast delivery.
//!
//! ## Architecture
//! ```text
//! RecipientRegistry (single-writer, JSON file)
//!   └── RecipientStore: recipients.json, rewritten on every mutation
//!
//! BroadcastDispatcher (one run at a time)
//!   ├── ≤ 3 items  → back-to-back
//!   ├── > 3 items  → wait min(max_delay·(i+1)/(n-1), max_delay) after item i
//!   └── per item   → DeliverySink::deliver, failures counted, never fatal
//! ```

pub mod dispatch;
pub mod registry;
pub mod store;

pub use dispatch::{
    BroadcastDispatcher, DeliverySink, DispatchItem, DispatchJob, DispatchPolicy, DispatchReport,
};
pub use registry::{Recipient, RecipientRegistry};
pub use store::RecipientStore;
