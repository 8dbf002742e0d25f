//! Gateway test fixture: the real command stack wired to a recording fake channel.

use async_trait::async_trait;
use axum::response::Response;
use castline_channels::Session;
use castline_commands::{CommandRouter, CommandSyntax, HandlerRegistry, Services};
use castline_core::config::CommandsConfig;
use castline_core::error::Result;
use castline_core::traits::MessagingGateway;
use castline_core::types::Payload;
use castline_core::{NumberingPlan, Shutdown};
use castline_scheduler::{BroadcastDispatcher, DispatchPolicy, RecipientRegistry};
use castline_security::Allowlist;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::server::AppState;

pub const OPERATOR: &str = "5492664031203";
pub const CUSTOMER: &str = "5491122334455";
pub const APP_SECRET: &str = "app-secret";

type Outbox = Arc<Mutex<Vec<(String, Payload)>>>;

struct RecordingGateway {
    outbox: Outbox,
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    fn name(&self) -> &str {
        "recording"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, recipient: &str, payload: &Payload) -> Result<()> {
        self.outbox
            .lock()
            .unwrap()
            .push((recipient.to_string(), payload.clone()));
        Ok(())
    }
}

pub struct FixtureBuilder {
    name: String,
    api_key: Option<String>,
    connected: bool,
}

impl FixtureBuilder {
    pub fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub async fn build(self) -> Fixture {
        let dir = std::env::temp_dir().join(format!(
            "castline-test-gateway-{}-{}",
            std::process::id(),
            self.name
        ));
        std::fs::remove_dir_all(&dir).ok();

        let outbox: Outbox = Arc::default();
        let session = Arc::new(Session::new(
            Box::new(RecordingGateway {
                outbox: outbox.clone(),
            }),
            Duration::from_secs(5),
        ));
        if self.connected {
            session.connect().await.unwrap();
        }

        let plan = NumberingPlan::default();
        let commands = CommandsConfig::default();
        let services = Arc::new(Services {
            session,
            registry: Arc::new(
                RecipientRegistry::open(&dir.join("recipients.json"), plan.clone()).await,
            ),
            allowlist: Arc::new(Allowlist::new([OPERATOR])),
            directory: None,
            dispatcher: Arc::new(BroadcastDispatcher::new(
                DispatchPolicy {
                    max_delay: Duration::ZERO,
                    ..DispatchPolicy::default()
                },
                Shutdown::new(),
            )),
            numbering: plan,
            syntax: CommandSyntax::from(&commands),
            broadcast_prefix: commands.broadcast_prefix.clone(),
            directory_timeout: Duration::from_secs(1),
        });
        let router = CommandRouter::new(HandlerRegistry::with_defaults(&commands), services);

        Fixture {
            state: AppState {
                commands: Arc::new(router),
                api_key: self.api_key,
                webhook_verify_token: "verify-me".into(),
                app_secret: APP_SECRET.into(),
                start_time: std::time::Instant::now(),
            },
            outbox,
            dir,
        }
    }
}

pub struct Fixture {
    pub state: AppState,
    outbox: Outbox,
    dir: PathBuf,
}

impl Fixture {
    pub fn builder(name: &str) -> FixtureBuilder {
        FixtureBuilder {
            name: name.to_string(),
            api_key: None,
            connected: true,
        }
    }

    pub fn services(&self) -> &Services {
        self.state.commands.services()
    }

    pub fn sent(&self) -> Vec<(String, Payload)> {
        self.outbox.lock().unwrap().clone()
    }

    pub fn texts_to(&self, number: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(r, _)| r == number)
            .map(|(_, p)| p.preview().to_string())
            .collect()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

pub async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `X-Hub-Signature-256` value Meta would send for `body` under `secret`.
pub fn hub_signature(secret: &str, body: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={:x}", mac.finalize().into_bytes())
}
