//! Channel session: the single owned handle to the messaging gateway.
//!
//! Every send goes through [`Session::send`], which holds the gateway lock for
//! the duration of the call, so at most one delivery is in flight against the
//! channel. The lifecycle is an explicit state machine observable through
//! [`Session::subscribe`]; sends are refused unless the state is `Ready`.

use castline_core::error::{CastlineError, Result};
use castline_core::traits::MessagingGateway;
use castline_core::types::Payload;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{Mutex, watch};

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Authenticated,
    Ready,
    Failed(String),
    Disconnected(String),
    Closed,
}

/// Lifecycle events emitted by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Authenticated,
    Ready,
    Failed(String),
    Disconnected(String),
}

/// Thread-safe session handle.
pub struct Session {
    gateway: Mutex<Box<dyn MessagingGateway>>,
    state: watch::Sender<SessionState>,
    send_timeout: Duration,
}

impl Session {
    pub fn new(gateway: Box<dyn MessagingGateway>, send_timeout: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            gateway: Mutex::new(gateway),
            state,
            send_timeout,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Ready)
    }

    /// Apply a lifecycle event. A closed session ignores further events.
    pub fn apply(&self, event: SessionEvent) {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Closed {
                return false;
            }
            let next = match event {
                SessionEvent::Authenticated => {
                    tracing::info!("✅ Session authenticated");
                    SessionState::Authenticated
                }
                SessionEvent::Ready => {
                    tracing::info!("🚀 Session ready");
                    SessionState::Ready
                }
                SessionEvent::Failed(reason) => {
                    tracing::error!("❌ Session failed: {reason}");
                    SessionState::Failed(reason)
                }
                SessionEvent::Disconnected(reason) => {
                    tracing::warn!("🔌 Session disconnected: {reason}");
                    SessionState::Disconnected(reason)
                }
            };
            let changed = *state != next;
            *state = next;
            changed
        });
    }

    /// Connect the underlying gateway and move to `Ready` on success.
    pub async fn connect(&self) -> Result<()> {
        let mut gateway = self.gateway.lock().await;
        tracing::info!("Connecting {} channel...", gateway.name());
        match gateway.connect().await {
            Ok(()) => {
                self.apply(SessionEvent::Authenticated);
                self.apply(SessionEvent::Ready);
                Ok(())
            }
            Err(e) => {
                self.apply(SessionEvent::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Send one payload to a canonical recipient.
    ///
    /// Fails fast with [`CastlineError::Session`] when the session is not ready,
    /// and with [`CastlineError::Timeout`] when the gateway hangs.
    pub async fn send(&self, recipient: &str, payload: &Payload) -> Result<()> {
        self.ensure_ready()?;
        let attempt = async {
            let gateway = self.gateway.lock().await;
            // State may have changed while waiting for the lock.
            match self.ensure_ready() {
                Ok(()) => gateway.send(recipient, payload).await,
                Err(e) => Err(e),
            }
        };
        match tokio::time::timeout(self.send_timeout, attempt).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(CastlineError::Session(reason))) => {
                self.apply(SessionEvent::Disconnected(reason.clone()));
                Err(CastlineError::Session(reason))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CastlineError::Timeout(self.send_timeout.as_millis() as u64)),
        }
    }

    /// Close the gateway. No sends are accepted afterwards.
    pub async fn close(&self) -> Result<()> {
        let mut gateway = self.gateway.lock().await;
        self.state.send_replace(SessionState::Closed);
        gateway.disconnect().await?;
        tracing::info!("✅ {} session closed", gateway.name());
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        match &*self.state.borrow() {
            SessionState::Ready => Ok(()),
            other => Err(CastlineError::Session(format!("session not ready ({other:?})"))),
        }
    }
}
